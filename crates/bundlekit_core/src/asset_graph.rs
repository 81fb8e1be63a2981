use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Deserialize;
use serde::Serialize;

use crate::types::AssetId;
use crate::types::AssetInfo;

pub type AssetGraphProviderRef = Arc<dyn AssetGraphProvider + Send + Sync>;

/// Answers questions about the project's asset metadata store.
///
/// Every query is asynchronous since real stores are backed by disk or by
/// another process.
#[mockall::automock]
#[async_trait]
pub trait AssetGraphProvider {
  /// Every asset known to the project
  async fn assets(&self) -> anyhow::Result<Vec<AssetInfo>>;

  async fn get_asset(&self, id: &AssetId) -> Option<AssetInfo>;

  /// Direct dependencies of an asset, in declaration order
  async fn dependencies(&self, id: &AssetId) -> Vec<AssetId>;

  /// Reverse dependency query: assets that directly depend on `id`
  async fn users_of(&self, id: &AssetId) -> Vec<AssetId>;
}

/// On-disk shape of an exported asset database.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDatabase {
  pub assets: Vec<AssetInfo>,
}

/// An asset graph held fully in memory.
///
/// Dependencies may point at ids that have no [`AssetInfo`]; those show up as
/// nodes without metadata so that `get_asset` reports them missing.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssetGraph {
  graph: StableDiGraph<AssetId, ()>,
  node_ids: HashMap<AssetId, NodeIndex>,
  assets: HashMap<AssetId, AssetInfo>,
  order: Vec<AssetId>,
}

impl InMemoryAssetGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_assets(assets: impl IntoIterator<Item = AssetInfo>) -> Self {
    let mut graph = Self::new();
    for asset in assets {
      graph.add_asset(asset);
    }
    graph
  }

  pub fn from_json(source: &str) -> anyhow::Result<Self> {
    let database: AssetDatabase = serde_json::from_str(source)?;
    Ok(Self::from_assets(database.assets))
  }

  pub fn add_asset(&mut self, asset: AssetInfo) {
    let node = self.node_for(&asset.id);

    let stale_edges: Vec<_> = self
      .graph
      .edges_directed(node, Direction::Outgoing)
      .map(|edge| edge.id())
      .collect();
    for edge in stale_edges {
      self.graph.remove_edge(edge);
    }

    for dependency in &asset.dependencies {
      let dependency_node = self.node_for(dependency);
      self.graph.add_edge(node, dependency_node, ());
    }

    if !self.assets.contains_key(&asset.id) {
      self.order.push(asset.id.clone());
    }
    self.assets.insert(asset.id.clone(), asset);
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  fn node_for(&mut self, id: &AssetId) -> NodeIndex {
    if let Some(node) = self.node_ids.get(id) {
      return *node;
    }
    let node = self.graph.add_node(id.clone());
    self.node_ids.insert(id.clone(), node);
    node
  }
}

#[async_trait]
impl AssetGraphProvider for InMemoryAssetGraph {
  async fn assets(&self) -> anyhow::Result<Vec<AssetInfo>> {
    Ok(
      self
        .order
        .iter()
        .filter_map(|id| self.assets.get(id).cloned())
        .collect(),
    )
  }

  async fn get_asset(&self, id: &AssetId) -> Option<AssetInfo> {
    self.assets.get(id).cloned()
  }

  async fn dependencies(&self, id: &AssetId) -> Vec<AssetId> {
    self
      .assets
      .get(id)
      .map(|asset| asset.dependencies.clone())
      .unwrap_or_default()
  }

  async fn users_of(&self, id: &AssetId) -> Vec<AssetId> {
    let Some(node) = self.node_ids.get(id) else {
      return Vec::new();
    };

    let mut users: Vec<AssetId> = self
      .graph
      .neighbors_directed(*node, Direction::Incoming)
      .filter_map(|user| self.graph.node_weight(user).cloned())
      .collect();
    users.sort();
    users.dedup();
    users
  }
}
