//! Projection strategy resolution.
//!
//! | caller generator | map source valid | resolved strategy                           |
//! |------------------|------------------|---------------------------------------------|
//! | yes              | any              | `Custom`, options unchanged                 |
//! | no               | valid            | `Categorical`, options carry the parsed map |
//! | no               | missing/invalid  | `Numeric`, options unchanged                |

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catmap::CategoricalMapSource;
use crate::projection::{
    ProjectionGenerator, ProjectionMatrix, ProjectionOptions, ProjectionStrategy, StrategyKind,
};
use crate::rng::Substream;

/// A projection strategy together with the options it is called with.
#[derive(Debug, Clone)]
pub struct ResolvedProjection {
    strategy: ProjectionStrategy,
    options: ProjectionOptions,
}

impl ResolvedProjection {
    /// Return the resolved strategy.
    #[must_use]
    pub fn strategy(&self) -> &ProjectionStrategy {
        &self.strategy
    }

    /// Return the options passed to the strategy.
    #[must_use]
    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    /// Return the strategy's variant tag.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Draw the projection matrix for one node.
    pub fn generate(&self, rng: &mut Substream) -> ProjectionMatrix {
        self.strategy.generate(&self.options, rng)
    }
}

/// Decide which projection strategy a build uses.
///
/// Never fails: an unreadable or invalid categorical map degrades to the
/// numeric strategy with a warning.
pub(crate) fn resolve_projection(
    generator: Option<&Arc<dyn ProjectionGenerator>>,
    map_source: Option<&CategoricalMapSource>,
    options: ProjectionOptions,
) -> ResolvedProjection {
    if let Some(generator) = generator {
        debug!("using caller-supplied projection generator");
        return ResolvedProjection {
            strategy: ProjectionStrategy::Custom(Arc::clone(generator)),
            options,
        };
    }

    let Some(source) = map_source else {
        return ResolvedProjection {
            strategy: ProjectionStrategy::Numeric,
            options,
        };
    };

    match source.load(options.n_features()) {
        Ok(map) => {
            debug!(
                n_groups = map.groups().len(),
                "using categorical projection strategy"
            );
            ResolvedProjection {
                strategy: ProjectionStrategy::Categorical,
                options: options.with_categorical_map(map),
            }
        }
        Err(e) => {
            warn!(error = %e, "ignoring categorical map, using numeric projections");
            ResolvedProjection {
                strategy: ProjectionStrategy::Numeric,
                options,
            }
        }
    }
}
