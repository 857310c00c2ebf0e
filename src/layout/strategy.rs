use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::physics::{ChargeForce, CollideForce};
use crate::error::GraphError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStrategy {
    /// Radial cluster placement with weak global forces.
    #[default]
    Default,
    /// Grid-packed clusters held together by virtual intra-cluster links.
    Experimental,
}

impl LayoutStrategy {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Experimental => "experimental",
        }
    }

    pub(crate) fn profile(self) -> ForceProfile {
        match self {
            Self::Default => DEFAULT_PROFILE,
            Self::Experimental => EXPERIMENTAL_PROFILE,
        }
    }
}

impl fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LayoutStrategy {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "experimental" => Ok(Self::Experimental),
            _ => Err(GraphError::UnknownStrategy(value.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LinkProfile {
    pub(crate) strength: f32,
    pub(crate) intra_cluster_distance: f32,
    pub(crate) inter_cluster_distance: f32,
}

/// Steady-state force configuration of a strategy. The constants only make
/// sense together; tune them as a set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ForceProfile {
    pub(crate) real_links: LinkProfile,
    pub(crate) virtual_links: Option<LinkProfile>,
    pub(crate) charge: ChargeForce,
    pub(crate) center_strength: f32,
    pub(crate) collide: CollideForce,
    pub(crate) alpha: f32,
    pub(crate) alpha_decay: f32,
    pub(crate) alpha_min: f32,
    pub(crate) velocity_decay: f32,
}

const DEFAULT_PROFILE: ForceProfile = ForceProfile {
    real_links: LinkProfile {
        strength: 0.01,
        intra_cluster_distance: 30.0,
        inter_cluster_distance: 200.0,
    },
    virtual_links: None,
    charge: ChargeForce {
        strength: -5.0,
        distance_max: 150.0,
    },
    center_strength: 0.01,
    collide: CollideForce {
        strength: 0.8,
        iterations: 2,
    },
    alpha: 0.3,
    alpha_decay: 0.02,
    alpha_min: 0.001,
    velocity_decay: 0.4,
};

const EXPERIMENTAL_PROFILE: ForceProfile = ForceProfile {
    real_links: LinkProfile {
        strength: 0.7,
        intra_cluster_distance: 20.0,
        inter_cluster_distance: 20.0,
    },
    virtual_links: Some(LinkProfile {
        strength: 0.3,
        intra_cluster_distance: 30.0,
        inter_cluster_distance: 30.0,
    }),
    charge: ChargeForce {
        strength: -30.0,
        distance_max: 100.0,
    },
    center_strength: 0.1,
    collide: CollideForce {
        strength: 0.7,
        iterations: 2,
    },
    alpha: 0.3,
    alpha_decay: 0.02,
    alpha_min: 0.001,
    velocity_decay: 0.6,
};

/// Overrides applied after a drag so the layout settles instead of flying
/// apart: capped repulsion, firmer centering, heavy damping, low energy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SettleProfile {
    pub(crate) charge: ChargeForce,
    pub(crate) center_strength: f32,
    pub(crate) velocity_decay: f32,
    pub(crate) alpha: f32,
    pub(crate) alpha_decay: f32,
    pub(crate) alpha_min: f32,
}

pub(crate) const SETTLE_PROFILE: SettleProfile = SettleProfile {
    charge: ChargeForce {
        strength: -50.0,
        distance_max: 150.0,
    },
    center_strength: 0.02,
    velocity_decay: 0.8,
    alpha: 0.1,
    alpha_decay: 0.02,
    alpha_min: 0.001,
};

/// Energy used by resume, resize and collision updates.
pub(crate) const NUDGE_ALPHA: f32 = 0.3;
/// Energy used by a full relayout.
pub(crate) const RELAYOUT_ALPHA: f32 = 1.0;
/// Alpha target held while a node is dragged.
pub(crate) const DRAG_ALPHA_TARGET: f32 = 0.3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strategy_names() {
        assert_eq!("default".parse::<LayoutStrategy>(), Ok(LayoutStrategy::Default));
        assert_eq!(" Experimental ".parse::<LayoutStrategy>(), Ok(LayoutStrategy::Experimental));
        assert_eq!(
            "radial".parse::<LayoutStrategy>(),
            Err(GraphError::UnknownStrategy("radial".to_owned()))
        );
    }

    #[test]
    fn real_links_pull_harder_and_closer_than_virtual_links() {
        let profile = LayoutStrategy::Experimental.profile();
        let virtual_links = profile.virtual_links.expect("experimental has virtual links");

        assert!(profile.real_links.strength > virtual_links.strength);
        assert!(profile.real_links.intra_cluster_distance < virtual_links.intra_cluster_distance);
        assert!(profile.center_strength > LayoutStrategy::Default.profile().center_strength);
    }
}
