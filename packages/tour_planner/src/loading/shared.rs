//! Holds the path network for the lifetime of the process. The graph is
//! loaded at most once; every caller after that shares the same read-only
//! copy without taking any locks.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{error, info};

use crate::error::GraphFormatError;
use crate::loading::geojson::{LoadOptions, load_graph_from_path};
use crate::loading::petgraph::GeoGraph;

type LoadResult = Result<Arc<GeoGraph>, GraphFormatError>;

#[derive(Debug)]
struct SharedInner {
    path: Option<PathBuf>,
    options: LoadOptions,
    graph: OnceLock<LoadResult>,
}

/// Cheap to clone handle to the path network. Created during startup and
/// passed to whatever needs the graph.
#[derive(Debug, Clone)]
pub struct SharedGraph {
    inner: Arc<SharedInner>,
}

impl SharedGraph {
    /// The graph will be read from `path` the first time it is needed.
    /// Concurrent first requests wait for a single load to finish
    pub fn lazy(path: PathBuf, options: LoadOptions) -> SharedGraph {
        SharedGraph {
            inner: Arc::new(SharedInner {
                path: Some(path),
                options,
                graph: OnceLock::new(),
            }),
        }
    }

    /// Wrap a graph which has already been built
    pub fn preloaded(graph: GeoGraph) -> SharedGraph {
        SharedGraph::from_result(Ok(Arc::new(graph)))
    }

    /// Record a failed load, which disables the graph for every caller
    pub fn failed(err: GraphFormatError) -> SharedGraph {
        SharedGraph::from_result(Err(err))
    }

    fn from_result(result: LoadResult) -> SharedGraph {
        SharedGraph {
            inner: Arc::new(SharedInner {
                path: None,
                options: LoadOptions::default(),
                graph: OnceLock::from(result),
            }),
        }
    }

    /// Retrieve the graph, loading it if this is the first call. A load which
    /// failed once stays failed
    pub fn get(&self) -> LoadResult {
        self.inner.graph.get_or_init(|| self.load()).clone()
    }

    /// Retrieve the graph only if loading has already been attempted
    pub fn try_get(&self) -> Option<LoadResult> {
        self.inner.graph.get().cloned()
    }

    fn load(&self) -> LoadResult {
        let path = match &self.inner.path {
            Some(path) => path,
            None => {
                return Err(GraphFormatError::Io(
                    "no geodata source configured".to_string(),
                ));
            }
        };

        info!("Loading path network from {}", path.display());
        match load_graph_from_path(path, &self.inner.options) {
            Ok(graph) => Ok(Arc::new(graph)),
            Err(err) => {
                error!("Path network is unavailable: {err}");
                Err(err)
            }
        }
    }
}
