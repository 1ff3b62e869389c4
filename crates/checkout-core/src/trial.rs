//! Trial Gate
//!
//! Decides when the unlock popup is offered. The game reports completed
//! matches; once the count reaches the threshold and the player has not
//! paid, the popup shows. Entitlement lives in memory for the session only.

use serde::{Deserialize, Serialize};

use crate::config::WidgetConfig;
use crate::model::UserIdentity;

/// Free-play allowance and entitlement for one session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialGate {
    threshold: u32,
    completed_matches: u32,
    entitled: bool,
    dismissed_at: Option<u32>,
}

impl TrialGate {
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            completed_matches: 0,
            entitled: false,
            dismissed_at: None,
        }
    }

    /// Gate using the configured free-play allowance
    pub fn from_config(config: &WidgetConfig) -> Self {
        Self::new(config.trial_threshold)
    }

    pub const fn completed_matches(&self) -> u32 {
        self.completed_matches
    }

    pub const fn is_entitled(&self) -> bool {
        self.entitled
    }

    /// A match finished (win, loss or draw)
    pub fn record_match(&mut self) -> u32 {
        self.completed_matches = self.completed_matches.saturating_add(1);
        tracing::debug!(completed = self.completed_matches, threshold = self.threshold, "Match recorded");
        self.completed_matches
    }

    /// Payment captured; suppress the popup for the rest of the session
    pub fn grant_entitlement(&mut self) {
        if !self.entitled {
            tracing::info!(completed = self.completed_matches, "Unlimited play unlocked");
        }
        self.entitled = true;
    }

    /// Popup closed without paying; it returns after the next match
    pub fn dismiss(&mut self) {
        self.dismissed_at = Some(self.completed_matches);
    }

    /// Whether the popup should be visible for `user`
    pub fn should_show(&self, user: Option<&UserIdentity>) -> bool {
        user.is_some()
            && !self.entitled
            && self.completed_matches >= self.threshold
            && self.dismissed_at != Some(self.completed_matches)
    }
}

impl Default for TrialGate {
    fn default() -> Self {
        Self::from_config(&WidgetConfig::default())
    }
}
