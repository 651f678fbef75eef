//! Engine index cache keyed by element ID.

use std::collections::HashMap;

use wd_engine::{HydraulicEngine, SolverAdapter};
use wd_graph::Network;

use crate::error::SimResult;

/// Engine indices as of one structural epoch.
#[derive(Debug, Default)]
pub(crate) struct IndexCache {
    epoch: Option<u64>,
    nodes: HashMap<String, usize>,
    links: HashMap<String, usize>,
}

impl IndexCache {
    pub(crate) fn is_fresh(&self, epoch: u64) -> bool {
        self.epoch == Some(epoch)
    }

    pub(crate) fn rebuild<E: HydraulicEngine>(
        &mut self,
        adapter: &SolverAdapter<E>,
        network: &Network,
        epoch: u64,
    ) -> SimResult<()> {
        self.epoch = None;
        self.nodes.clear();
        self.links.clear();
        for id in network.nodes().ids() {
            self.nodes.insert(id.to_string(), adapter.node_index(id)?);
        }
        for id in network.links().ids() {
            self.links.insert(id.to_string(), adapter.link_index(id)?);
        }
        self.epoch = Some(epoch);
        Ok(())
    }

    pub(crate) fn node(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).copied()
    }

    pub(crate) fn link(&self, id: &str) -> Option<usize> {
        self.links.get(id).copied()
    }
}
