use std::collections::BTreeMap;

use bundlekit_core::asset_graph::AssetGraphProvider;
use bundlekit_core::types::AssetId;
use bundlekit_core::types::Bundle;
use thiserror::Error;

/// A broken ownership invariant found after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionViolation {
  #[error("Asset {asset} is both owned and redirected by bundle {bundle}")]
  OwnedAndRedirected { bundle: String, asset: AssetId },

  #[error("Asset {asset} is owned by more than one bundle: {}", .bundles.join(", "))]
  OwnedByMany { asset: AssetId, bundles: Vec<String> },

  #[error("Bundle {bundle} redirects {asset} to {target}, which does not own it")]
  DanglingRedirect {
    bundle: String,
    asset: AssetId,
    target: String,
  },
}

/// Checks that every asset is owned by exactly one bundle and that redirects
/// point at the owner.
pub fn check_partition(bundles: &[Bundle]) -> Vec<PartitionViolation> {
  let mut violations = Vec::new();
  let mut owners: BTreeMap<&AssetId, Vec<&str>> = BTreeMap::new();

  for bundle in bundles {
    for asset in &bundle.assets {
      owners.entry(asset).or_default().push(&bundle.name);

      if bundle.redirects.contains_key(asset) {
        violations.push(PartitionViolation::OwnedAndRedirected {
          bundle: bundle.name.clone(),
          asset: asset.clone(),
        });
      }
    }
  }

  for (asset, names) in &owners {
    if names.len() > 1 {
      violations.push(PartitionViolation::OwnedByMany {
        asset: (*asset).clone(),
        bundles: names.iter().map(|n| n.to_string()).collect(),
      });
    }
  }

  for bundle in bundles {
    for (asset, target) in &bundle.redirects {
      let owned_by_target = owners
        .get(asset)
        .is_some_and(|names| names.contains(&target.as_str()));
      if !owned_by_target {
        violations.push(PartitionViolation::DanglingRedirect {
          bundle: bundle.name.clone(),
          asset: asset.clone(),
          target: target.clone(),
        });
      }
    }
  }

  violations
}

/// Lists the assets owned by `bundle` that directly use `asset`.
///
/// Used to explain why a bundle ended up with a redirect.
pub async fn explain_redirect(
  provider: &(dyn AssetGraphProvider + Send + Sync),
  bundle: &Bundle,
  asset: &AssetId,
) -> Vec<AssetId> {
  provider
    .users_of(asset)
    .await
    .into_iter()
    .filter(|user| bundle.owns(user))
    .collect()
}
