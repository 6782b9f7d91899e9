use std::sync::Arc;

use tracing::{debug, info, warn};

use super::reputation::{NukeDatabase, ReleaseDatabase, ReputationError};
use super::{PreDbClient, SrrDbClient};
use crate::config::ReputationConfig;
use crate::metrics;
use crate::provider::ProviderPolicy;

/// Verdict of the reputation consensus for one release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneStatus {
    /// At least one service listed the release.
    Confirmed,
    /// The pre database carries an active nuke or lists the release without a pre time.
    Nuked { reason: String },
    /// Reachable services did not list the release.
    Unconfirmed { detail: String },
    /// No service answered.
    Unreachable { detail: String },
}

impl SceneStatus {
    pub fn is_rejected(&self) -> bool {
        !matches!(self, SceneStatus::Confirmed)
    }

    pub fn nuke_reason(&self) -> Option<&str> {
        match self {
            SceneStatus::Nuked { reason } => Some(reason),
            _ => None,
        }
    }

    /// Human readable rejection reason, empty for a confirmed release.
    pub fn reason(&self) -> &str {
        match self {
            SceneStatus::Confirmed => "",
            SceneStatus::Nuked { reason } => reason,
            SceneStatus::Unconfirmed { detail } | SceneStatus::Unreachable { detail } => detail,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SceneStatus::Confirmed => "confirmed",
            SceneStatus::Nuked { .. } => "nuked",
            SceneStatus::Unconfirmed { .. } => "unconfirmed",
            SceneStatus::Unreachable { .. } => "unreachable",
        }
    }
}

/// What ranking does with a candidate after the scene filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneGate {
    Accept,
    /// Keep only if no accepted candidate survives.
    Fallback,
    Reject,
}

/// Combines the two reputation services into one verdict.
pub struct SceneChecker {
    releases: Arc<dyn ReleaseDatabase>,
    pres: Arc<dyn NukeDatabase>,
}

impl SceneChecker {
    pub fn new(releases: Arc<dyn ReleaseDatabase>, pres: Arc<dyn NukeDatabase>) -> Self {
        Self { releases, pres }
    }

    pub fn from_config(config: &ReputationConfig) -> Result<Self, ReputationError> {
        Ok(Self::new(
            Arc::new(SrrDbClient::new(config)?),
            Arc::new(PreDbClient::new(config)?),
        ))
    }

    /// Query both services concurrently and fold their answers.
    ///
    /// A confirmation from either service wins. An active nuke, or a pre
    /// listing without a pre time, is reported next. When neither service answers the release is rejected.
    pub async fn check(&self, name: &str) -> SceneStatus {
        let (release, pre) = tokio::join!(self.releases.find_release(name), self.pres.find_pre(name));

        let mut unreachable: Vec<String> = Vec::new();
        let mut confirmed_by: Option<&str> = None;
        let mut nuke_reason: Option<String> = None;

        match release {
            Ok(Some(_)) => confirmed_by = Some(self.releases.name()),
            Ok(None) => debug!(name = %name, service = self.releases.name(), "Release not listed"),
            Err(e) => {
                warn!(service = self.releases.name(), error = %e, "Reputation lookup failed");
                unreachable.push(self.releases.name().to_string());
            }
        }

        match pre {
            Ok(Some(record)) => match record.nuke.filter(|n| n.is_active()) {
                Some(nuke) => {
                    nuke_reason = Some(nuke.reason.unwrap_or(nuke.kind));
                }
                None if record.pre_at > 0 => {
                    confirmed_by = confirmed_by.or(Some(self.pres.name()));
                }
                None => {
                    debug!(name = %name, service = self.pres.name(), "Listed without pre time");
                    nuke_reason = Some("no pre time".to_string());
                }
            },
            Ok(None) => debug!(name = %name, service = self.pres.name(), "Release not listed"),
            Err(e) => {
                warn!(service = self.pres.name(), error = %e, "Reputation lookup failed");
                unreachable.push(self.pres.name().to_string());
            }
        }

        let status = if let Some(service) = confirmed_by {
            debug!(name = %name, service = service, "Scene release confirmed");
            SceneStatus::Confirmed
        } else if let Some(reason) = nuke_reason {
            SceneStatus::Nuked { reason }
        } else if unreachable.len() == 2 {
            SceneStatus::Unreachable {
                detail: format!("Failed to contact {}", unreachable.join(", ")),
            }
        } else {
            SceneStatus::Unconfirmed {
                detail: "not a confirmed scene release".to_string(),
            }
        };

        metrics::SCENE_CHECKS
            .with_label_values(&[status.label()])
            .inc();
        status
    }

    /// Apply a provider's scene flags to one candidate name.
    pub async fn gate(&self, name: &str, policy: &ProviderPolicy) -> SceneGate {
        let or_contain = policy.scene_only
            && policy.scene_or_contain.contains_any_loose(name) == Some(true);
        if or_contain && !policy.scene_reject_nuked {
            debug!(name = %name, "Scene check skipped on provider name match");
            return SceneGate::Accept;
        }

        let status = self.check(name).await;
        if !status.is_rejected() {
            return SceneGate::Accept;
        }

        match status.nuke_reason() {
            Some(reason) => {
                if policy.scene_nuked_active {
                    info!(name = %name, reason = %reason, "Keeping nuked release as fallback");
                    SceneGate::Fallback
                } else if policy.scene_reject_nuked {
                    info!(name = %name, reason = %reason, "Rejecting nuked release");
                    SceneGate::Reject
                } else {
                    debug!(name = %name, reason = %reason, "Considering nuked release");
                    SceneGate::Accept
                }
            }
            None => {
                if or_contain || policy.scene_loose || policy.scene_loose_active {
                    debug!(name = %name, reason = status.reason(), "Keeping unconfirmed release as fallback");
                    SceneGate::Fallback
                } else if policy.scene_only {
                    info!(name = %name, reason = status.reason(), "Rejecting non scene release");
                    SceneGate::Reject
                } else {
                    SceneGate::Accept
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::WordList;
    use crate::testing::{MockNukeDb, MockReleaseDb};

    fn checker(releases: &MockReleaseDb, pres: &MockNukeDb) -> SceneChecker {
        SceneChecker::new(Arc::new(releases.clone()), Arc::new(pres.clone()))
    }

    #[tokio::test]
    async fn test_confirmed_by_release_database() {
        let releases = MockReleaseDb::new();
        releases.add_release("Show.S01E01-GRP").await;
        let pres = MockNukeDb::new();
        pres.set_unreachable(true).await;

        let status = checker(&releases, &pres).check("Show.S01E01-GRP").await;
        assert_eq!(status, SceneStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_release_db_down_pre_db_confirms() {
        let releases = MockReleaseDb::new();
        releases.set_unreachable(true).await;
        let pres = MockNukeDb::new();
        pres.add_pre("Show.S01E01-GRP", 1_700_000_000, None).await;

        let status = checker(&releases, &pres).check("Show.S01E01-GRP").await;
        assert!(!status.is_rejected());
    }

    #[tokio::test]
    async fn test_both_unreachable_fails_closed() {
        let releases = MockReleaseDb::new();
        releases.set_unreachable(true).await;
        let pres = MockNukeDb::new();
        pres.set_unreachable(true).await;

        let status = checker(&releases, &pres).check("Show.S01E01-GRP").await;
        assert!(status.is_rejected());
        assert!(status.reason().starts_with("Failed to contact"));
    }

    #[tokio::test]
    async fn test_nuke_reported() {
        let releases = MockReleaseDb::new();
        let pres = MockNukeDb::new();
        pres.add_pre("Show.S01E01-GRP", 1_700_000_000, Some(("nuke", "bad.ivtc")))
            .await;

        let status = checker(&releases, &pres).check("Show.S01E01-GRP").await;
        assert_eq!(status.nuke_reason(), Some("bad.ivtc"));
    }

    #[tokio::test]
    async fn test_unnuke_counts_as_confirmed() {
        let releases = MockReleaseDb::new();
        let pres = MockNukeDb::new();
        pres.add_pre("Show.S01E01-GRP", 1_700_000_000, Some(("unnuke", "fine.after.all")))
            .await;

        let status = checker(&releases, &pres).check("Show.S01E01-GRP").await;
        assert_eq!(status, SceneStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_pretime_zero_marks_nuked() {
        let pres = MockNukeDb::new();
        pres.add_pre("Show.S01E01-GRP", 0, None).await;
        let checker = checker(&MockReleaseDb::new(), &pres);

        let status = checker.check("Show.S01E01-GRP").await;
        assert_eq!(status.nuke_reason(), Some("no pre time"));

        let reject = ProviderPolicy {
            scene_reject_nuked: true,
            ..ProviderPolicy::default()
        };
        assert_eq!(checker.gate("Show.S01E01-GRP", &reject).await, SceneGate::Reject);
    }

    #[tokio::test]
    async fn test_not_listed_is_unconfirmed() {
        let status = checker(&MockReleaseDb::new(), &MockNukeDb::new())
            .check("Show.S01E01-P2P")
            .await;
        assert!(matches!(status, SceneStatus::Unconfirmed { .. }));
    }

    #[tokio::test]
    async fn test_gate_scene_only() {
        let policy = ProviderPolicy {
            scene_only: true,
            ..ProviderPolicy::default()
        };
        let checker = checker(&MockReleaseDb::new(), &MockNukeDb::new());
        assert_eq!(checker.gate("Show.S01E01-P2P", &policy).await, SceneGate::Reject);

        let loose = ProviderPolicy {
            scene_loose: true,
            ..policy.clone()
        };
        assert_eq!(checker.gate("Show.S01E01-P2P", &loose).await, SceneGate::Fallback);
    }

    #[tokio::test]
    async fn test_gate_or_contain_bypass() {
        let policy = ProviderPolicy {
            scene_only: true,
            scene_or_contain: WordList::parse("trusted"),
            ..ProviderPolicy::default()
        };
        let releases = MockReleaseDb::new();
        let checker = checker(&releases, &MockNukeDb::new());
        assert_eq!(
            checker.gate("Show.S01E01-TRUSTED", &policy).await,
            SceneGate::Accept
        );
        assert_eq!(releases.lookups().await, 0);
    }

    #[tokio::test]
    async fn test_gate_or_contain_still_rejects_nukes() {
        let policy = ProviderPolicy {
            scene_only: true,
            scene_or_contain: WordList::parse("trusted"),
            scene_reject_nuked: true,
            ..ProviderPolicy::default()
        };
        let releases = MockReleaseDb::new();
        let pres = MockNukeDb::new();
        pres.add_pre("Show.S01E01-TRUSTED", 1_700_000_000, Some(("nuke", "bad.aspect")))
            .await;
        let checker = checker(&releases, &pres);

        assert_eq!(
            checker.gate("Show.S01E01-TRUSTED", &policy).await,
            SceneGate::Reject
        );
        assert_eq!(releases.lookups().await, 1);
        assert_eq!(pres.lookups().await, 1);

        // Unlisted but matching the override: kept behind confirmed releases.
        assert_eq!(
            checker.gate("Show.S01E02-TRUSTED", &policy).await,
            SceneGate::Fallback
        );
    }

    #[tokio::test]
    async fn test_gate_nuked() {
        let pres = MockNukeDb::new();
        pres.add_pre("Show.S01E01-GRP", 1, Some(("nuke", "dupe"))).await;
        let checker = checker(&MockReleaseDb::new(), &pres);

        let reject = ProviderPolicy {
            scene_reject_nuked: true,
            ..ProviderPolicy::default()
        };
        assert_eq!(checker.gate("Show.S01E01-GRP", &reject).await, SceneGate::Reject);

        let active = ProviderPolicy {
            scene_nuked_active: true,
            ..reject
        };
        assert_eq!(checker.gate("Show.S01E01-GRP", &active).await, SceneGate::Fallback);
    }
}
