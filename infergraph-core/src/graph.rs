//! Fixed-topology graph: wiring validation, routing and stage execution
//!
//! A graph owns its stages and the port wiring between them. Each stage
//! runs on its own thread, draining a FIFO input channel; emitting to an
//! output port is a fire-and-forget send on the channel of the wired
//! downstream stage, so a sender never waits for the receiver to process.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::StageConfig;
use crate::error::{Error, Result};
use crate::memory::MemoryPool;
use crate::message::{GraphId, Message, PortAddress, PortId, StageId};
use crate::stage::{Emitter, PipelineStage, StageBinding, StageRole};

/// Declaration of one stage in a wiring spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage identity, unique within the graph
    pub id: StageId,

    /// Which variant the stage runs as
    pub role: StageRole,

    /// Configuration applied at stage init
    #[serde(default)]
    pub config: StageConfig,
}

/// One directed edge from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    /// Emitting stage
    pub from_stage: StageId,
    /// Output port on the emitting stage
    pub from_port: PortId,
    /// Receiving stage
    pub to_stage: StageId,
    /// Input port on the receiving stage
    pub to_port: PortId,
}

/// Declarative fixed topology of one deployment
///
/// Valid when every declared output port is wired exactly once, every wire
/// endpoint resolves, and the edges form a DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WiringSpec {
    /// Identity of the graph instance this spec describes
    pub graph: GraphId,

    /// The stages, in declaration order
    pub stages: Vec<StageSpec>,

    /// The edges between stage ports
    pub wires: Vec<Wire>,
}

/// Processing capabilities keyed by the stage they bind to
#[derive(Default)]
pub struct StageBindings {
    map: HashMap<StageId, StageBinding>,
}

impl StageBindings {
    /// Create an empty binding set
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a capability, builder style
    #[must_use]
    pub fn with(mut self, id: StageId, binding: StageBinding) -> Self {
        self.bind(id, binding);
        self
    }

    /// Bind a capability to `id`
    pub fn bind(&mut self, id: StageId, binding: StageBinding) {
        self.map.insert(id, binding);
    }
}

/// Validated routing plan derived from a wiring spec
struct Plan {
    /// Stage indices in topological source-to-sink order
    order: Vec<usize>,

    /// Per stage, per output port: destination stage index and input port
    outs: Vec<Vec<(usize, PortId)>>,
}

fn validate(spec: &WiringSpec) -> Result<Plan> {
    let n = spec.stages.len();
    if n == 0 {
        return Err(Error::Config("graph declares no stages".into()));
    }

    let mut index = HashMap::with_capacity(n);
    for (idx, stage) in spec.stages.iter().enumerate() {
        if index.insert(stage.id, idx).is_some() {
            return Err(Error::Config(format!("duplicate stage id {}", stage.id)));
        }
    }

    let mut outs: Vec<Vec<Option<(usize, PortId)>>> = spec
        .stages
        .iter()
        .map(|s| vec![None; s.role.output_ports() as usize])
        .collect();
    let mut indegree = vec![0usize; n];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];

    for wire in &spec.wires {
        let &from = index
            .get(&wire.from_stage)
            .ok_or_else(|| Error::Config(format!("wire from unknown stage {}", wire.from_stage)))?;
        let &to = index
            .get(&wire.to_stage)
            .ok_or_else(|| Error::Config(format!("wire to unknown stage {}", wire.to_stage)))?;

        if wire.from_port.0 >= spec.stages[from].role.output_ports() {
            return Err(Error::Config(format!(
                "{} has no output {}",
                wire.from_stage, wire.from_port
            )));
        }
        if wire.to_port.0 >= spec.stages[to].role.input_ports() {
            return Err(Error::Config(format!(
                "{} has no input {}",
                wire.to_stage, wire.to_port
            )));
        }

        let slot = &mut outs[from][wire.from_port.0 as usize];
        if slot.is_some() {
            return Err(Error::Config(format!(
                "output {} of {} is wired twice",
                wire.from_port, wire.from_stage
            )));
        }
        *slot = Some((to, wire.to_port));

        adjacency[from].push(to);
        indegree[to] += 1;
    }

    // Every declared output port must be wired somewhere.
    let mut resolved = Vec::with_capacity(n);
    for (idx, ports) in outs.into_iter().enumerate() {
        let mut stage_outs = Vec::with_capacity(ports.len());
        for (port, slot) in ports.into_iter().enumerate() {
            match slot {
                Some(dest) => stage_outs.push(dest),
                None => {
                    return Err(Error::Config(format!(
                        "dangling output {} on {}",
                        PortId(port as u32),
                        spec.stages[idx].id
                    )))
                }
            }
        }
        resolved.push(stage_outs);
    }

    // Kahn's algorithm; anything left unordered means a cycle.
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(idx) = ready.pop() {
        order.push(idx);
        for &next in &adjacency[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(next);
            }
        }
    }
    if order.len() != n {
        return Err(Error::Config("wiring contains a cycle".into()));
    }

    Ok(Plan {
        order,
        outs: resolved,
    })
}

/// Input sent to a stage thread
enum Inbound {
    /// A message for one of the stage's input ports
    Data { port: PortId, message: Message },

    /// Drain the queue up to this point, then exit
    Stop,
}

/// Routes a stage's output ports onto downstream input channels
struct ChannelEmitter {
    stage: StageId,
    ports: Vec<(PortId, Sender<Inbound>)>,
}

impl Emitter for ChannelEmitter {
    fn emit(&mut self, port: PortId, message: Message) -> Result<()> {
        let Some((dest_port, tx)) = self.ports.get(port.0 as usize) else {
            return Err(Error::UnwiredPort {
                stage: self.stage,
                port,
            });
        };

        let sent = tx.send(Inbound::Data {
            port: *dest_port,
            message,
        });
        if sent.is_err() {
            // The downstream stage is already gone (teardown in progress);
            // the message is dropped like any other mid-pipeline failure.
            debug!(stage = %self.stage, %port, "downstream input closed, message dropped");
        }
        Ok(())
    }
}

fn run_stage(
    mut stage: PipelineStage,
    rx: Receiver<Inbound>,
    mut emitter: ChannelEmitter,
) -> PipelineStage {
    while let Ok(inbound) = rx.recv() {
        match inbound {
            Inbound::Data { port, message } => {
                if let Err(err) = stage.process(port, message, &mut emitter) {
                    warn!(stage = %stage.id(), error = %err, "message dropped");
                }
            }
            Inbound::Stop => break,
        }
    }
    stage
}

/// A started stage: its input channel and the thread draining it
struct StageRunner {
    id: StageId,
    in_ports: u32,
    tx: Sender<Inbound>,
    handle: JoinHandle<PipelineStage>,
}

#[derive(Debug)]
enum GraphState {
    Created,
    Running,
    Destroyed,
}

/// A fixed set of stages plus the wiring between their ports
///
/// Created once from a validated spec, started, fed through
/// [`Graph::inject`] for one or more runs, and destroyed explicitly (or on
/// drop). Destruction is idempotent.
pub struct Graph {
    id: GraphId,
    plan: Plan,
    index: HashMap<StageId, usize>,
    pending: Vec<PipelineStage>,
    runners: Vec<Option<StageRunner>>,
    state: GraphState,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("stages", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl Graph {
    /// Validate `spec` and bind stage capabilities
    ///
    /// Fails fast with [`Error::Config`] on the first wiring violation,
    /// missing binding, or role mismatch.
    pub fn new(spec: &WiringSpec, bindings: StageBindings, pool: &Arc<MemoryPool>) -> Result<Self> {
        let plan = validate(spec)?;

        let mut map = bindings.map;
        let mut pending = Vec::with_capacity(spec.stages.len());
        let mut index = HashMap::with_capacity(spec.stages.len());

        for (idx, decl) in spec.stages.iter().enumerate() {
            let binding = map
                .remove(&decl.id)
                .ok_or_else(|| Error::Config(format!("no capability bound for {}", decl.id)))?;
            if binding.role() != decl.role {
                return Err(Error::Config(format!(
                    "{} is declared {:?} but bound as {:?}",
                    decl.id,
                    decl.role,
                    binding.role()
                )));
            }
            pending.push(PipelineStage::new(
                decl.id,
                decl.config.clone(),
                binding,
                Arc::clone(pool),
            ));
            index.insert(decl.id, idx);
        }

        if let Some(id) = map.keys().next() {
            return Err(Error::Config(format!("capability bound for unknown {id}")));
        }

        let runners = (0..pending.len()).map(|_| None).collect();
        Ok(Self {
            id: spec.graph,
            plan,
            index,
            pending,
            runners,
            state: GraphState::Created,
        })
    }

    /// Identity of this graph instance
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Initialize and start every stage in topological order
    ///
    /// If any stage fails init, already-initialized stages are torn down
    /// in reverse order before the error surfaces; the graph is then
    /// unusable.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.state, GraphState::Created) {
            return Err(Error::State("graph already started or destroyed".into()));
        }

        let mut stages = std::mem::take(&mut self.pending);

        let mut initialized: Vec<usize> = Vec::new();
        for &idx in &self.plan.order {
            if let Err(err) = stages[idx].init() {
                error!(stage = %stages[idx].id(), error = %err, "stage init failed, aborting startup");
                for &done in initialized.iter().rev() {
                    if let Err(teardown_err) = stages[done].teardown() {
                        warn!(stage = %stages[done].id(), error = %teardown_err, "teardown after failed startup");
                    }
                }
                self.state = GraphState::Destroyed;
                return Err(err);
            }
            initialized.push(idx);
        }

        for stage in &mut stages {
            stage.start()?;
        }

        let channels: Vec<(Sender<Inbound>, Receiver<Inbound>)> =
            stages.iter().map(|_| unbounded()).collect();

        for (idx, stage) in stages.into_iter().enumerate() {
            let ports = self.plan.outs[idx]
                .iter()
                .map(|&(dest, port)| (port, channels[dest].0.clone()))
                .collect();
            let emitter = ChannelEmitter {
                stage: stage.id(),
                ports,
            };
            let rx = channels[idx].1.clone();

            let runner = StageRunner {
                id: stage.id(),
                in_ports: stage.role().input_ports(),
                tx: channels[idx].0.clone(),
                handle: thread::Builder::new()
                    .name(stage.id().to_string())
                    .spawn(move || run_stage(stage, rx, emitter))?,
            };
            self.runners[idx] = Some(runner);
        }

        self.state = GraphState::Running;
        debug!(graph = %self.id, "graph started");
        Ok(())
    }

    /// Inject external data at an input port
    ///
    /// The only entry point for driver data. Delivery is asynchronous: a
    /// successful return means the message is queued, not processed.
    pub fn inject(&self, addr: PortAddress, message: Message) -> Result<()> {
        if !matches!(self.state, GraphState::Running) {
            return Err(Error::State("graph is not running".into()));
        }
        if addr.graph != self.id {
            return Err(Error::UnknownStage(addr.stage));
        }

        let &idx = self
            .index
            .get(&addr.stage)
            .ok_or(Error::UnknownStage(addr.stage))?;
        let runner = self.runners[idx]
            .as_ref()
            .ok_or_else(|| Error::State("stage is not running".into()))?;

        if addr.port.0 >= runner.in_ports {
            return Err(Error::UnwiredPort {
                stage: addr.stage,
                port: addr.port,
            });
        }

        runner
            .tx
            .send(Inbound::Data {
                port: addr.port,
                message,
            })
            .map_err(|_| Error::State("stage input closed".into()))
    }

    /// Tear down every stage in reverse topological order
    ///
    /// Each stage drains messages already queued before stopping; an
    /// in-flight adapter call is never interrupted. Destroying an
    /// already-destroyed graph is a no-op.
    pub fn destroy(&mut self) {
        match self.state {
            GraphState::Destroyed => {
                debug!(graph = %self.id, "destroy on already-destroyed graph");
            }
            GraphState::Created => {
                self.pending.clear();
                self.state = GraphState::Destroyed;
            }
            GraphState::Running => {
                for &idx in self.plan.order.iter().rev() {
                    let Some(runner) = self.runners[idx].take() else {
                        continue;
                    };
                    let _ = runner.tx.send(Inbound::Stop);
                    match runner.handle.join() {
                        Ok(mut stage) => {
                            if let Err(err) = stage.teardown() {
                                warn!(stage = %stage.id(), error = %err, "teardown failed");
                            }
                        }
                        Err(_) => error!(stage = %runner.id, "stage thread panicked"),
                    }
                }
                self.state = GraphState::Destroyed;
                debug!(graph = %self.id, "graph destroyed");
            }
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.destroy();
    }
}
