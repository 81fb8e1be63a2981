use std::collections::HashMap;
use std::collections::HashSet;

use bundlekit_core::asset_graph::AssetGraphProvider;
use bundlekit_core::error::BundlekitError;
use bundlekit_core::types::AssetId;
use bundlekit_core::types::Bundle;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::partition::check_partition;

/// Expands every bundle's root assets into their dependency closure and
/// decides which bundle physically owns each shared asset.
///
/// Bundles are walked one at a time: highest priority tier first, and by name
/// inside a tier. The first walk to reach an asset owns it; every later walk
/// that reaches it records a redirect to the owner and does not descend into
/// it again.
pub struct RedirectResolver<'a> {
  provider: &'a (dyn AssetGraphProvider + Send + Sync),
}

impl<'a> RedirectResolver<'a> {
  pub fn new(provider: &'a (dyn AssetGraphProvider + Send + Sync)) -> Self {
    Self { provider }
  }

  #[tracing::instrument(level = "info", skip_all, fields(bundles = bundles.len()))]
  pub async fn resolve(&self, bundles: &mut [Bundle]) {
    let mut owned: HashMap<AssetId, String> = HashMap::new();

    for tier in priority_tiers(bundles) {
      for index in &tier {
        self.walk_bundle(&mut bundles[*index], &mut owned).await;
      }

      // Every walk of this tier has finished before the next tier starts
      debug!(
        priority = bundles[tier[0]].priority,
        bundles = tier.len(),
        owned = owned.len(),
        "Resolved priority tier"
      );
    }

    for violation in check_partition(bundles) {
      error!("{}", violation);
    }
  }

  #[tracing::instrument(level = "debug", skip_all, fields(bundle = %bundle.name))]
  async fn walk_bundle(&self, bundle: &mut Bundle, owned: &mut HashMap<AssetId, String>) {
    bundle.assets.clear();
    bundle.redirects.clear();

    let mut visited: HashSet<AssetId> = HashSet::new();
    let roots: Vec<AssetId> = bundle.root_assets.iter().cloned().collect();

    for root in roots {
      let mut worklist: Vec<(AssetId, Option<AssetId>)> = vec![(root, None)];

      while let Some((asset_id, referenced_by)) = worklist.pop() {
        if !visited.insert(asset_id.clone()) {
          continue;
        }

        if let Some(owner) = owned.get(&asset_id) {
          if *owner != bundle.name {
            bundle.redirects.insert(asset_id, owner.clone());
          }
          continue;
        }

        if self.provider.get_asset(&asset_id).await.is_none() {
          let referenced_by = match &referenced_by {
            Some(parent) => parent.to_string(),
            None => format!("bundle {}", bundle.name),
          };
          warn!(
            bundle = %bundle.name,
            "{}, skipping",
            BundlekitError::MissingAsset {
              missing: asset_id,
              referenced_by,
            }
          );
          continue;
        }

        owned.insert(asset_id.clone(), bundle.name.clone());
        bundle.assets.insert(asset_id.clone());

        let dependencies = self.provider.dependencies(&asset_id).await;
        for dependency in dependencies.into_iter().rev() {
          if !visited.contains(&dependency) {
            worklist.push((dependency, Some(asset_id.clone())));
          }
        }
      }
    }

    debug!(
      assets = bundle.assets.len(),
      redirects = bundle.redirects.len(),
      "Walked bundle"
    );
  }
}

/// Groups bundle indices into priority tiers, highest priority first and by
/// name inside each tier.
pub fn priority_tiers(bundles: &[Bundle]) -> Vec<Vec<usize>> {
  let mut order: Vec<usize> = (0..bundles.len()).collect();
  order.sort_by(|a, b| {
    bundles[*b]
      .priority
      .cmp(&bundles[*a].priority)
      .then_with(|| bundles[*a].name.cmp(&bundles[*b].name))
  });

  let mut tiers: Vec<Vec<usize>> = Vec::new();
  for index in order {
    match tiers.last_mut() {
      Some(tier) if bundles[tier[0]].priority == bundles[index].priority => tier.push(index),
      _ => tiers.push(vec![index]),
    }
  }
  tiers
}
