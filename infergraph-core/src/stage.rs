//! Stage lifecycle and the per-variant processing contract

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{Delivery, ImageTransform, ModelRunner, TransformPlan};
use crate::buffer::Buffer;
use crate::completion::CompletionSignal;
use crate::config::{RunContext, StageConfig};
use crate::error::{Error, Result};
use crate::memory::MemoryPool;
use crate::message::{tags, Message, PortId, StageId};

/// The four stage variants of the fixed pipeline topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageRole {
    /// Accepts driver-injected data and forwards it unchanged
    Source,

    /// Applies the geometry/format adapter to each message
    Transform,

    /// Runs the model-execution adapter, emitting one message per output
    Inference,

    /// Delivers payloads and raises the completion signal
    Sink,
}

impl StageRole {
    /// Number of input ports a stage of this role owns
    pub fn input_ports(self) -> u32 {
        1
    }

    /// Number of output ports a stage of this role owns
    pub fn output_ports(self) -> u32 {
        match self {
            StageRole::Sink => 0,
            _ => 1,
        }
    }
}

/// Lifecycle state of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Constructed, processing capability not yet set up
    Uninitialized,

    /// One-time setup done, not yet accepting messages
    Initialized,

    /// Accepting and processing messages
    Running,

    /// Capability released; the stage accepts nothing further
    Terminated,
}

/// Destination for messages a stage emits on its output ports
///
/// The graph wires an emitter over per-edge channels; tests substitute a
/// collecting implementation.
pub trait Emitter {
    /// Hand `message` to whatever the given output port is wired to
    fn emit(&mut self, port: PortId, message: Message) -> Result<()>;
}

/// Processing capability bound to a stage, one variant per role
pub enum StageBinding {
    /// Pass-through; no external capability
    Source,

    /// Geometry/format conversion through an [`ImageTransform`]
    Transform {
        /// The conversion adapter
        adapter: Box<dyn ImageTransform>,
        /// Fixed source/destination geometry applied to every message
        plan: TransformPlan,
    },

    /// Model execution through a [`ModelRunner`]
    Inference {
        /// The model execution adapter
        runner: Box<dyn ModelRunner>,
    },

    /// Terminal delivery plus completion signalling
    Sink {
        /// The delivery handler
        delivery: Box<dyn Delivery>,
        /// Run-scoped completion flag shared with the driver
        completion: Arc<CompletionSignal>,
    },
}

impl StageBinding {
    /// The role this binding implements
    pub fn role(&self) -> StageRole {
        match self {
            StageBinding::Source => StageRole::Source,
            StageBinding::Transform { .. } => StageRole::Transform,
            StageBinding::Inference { .. } => StageRole::Inference,
            StageBinding::Sink { .. } => StageRole::Sink,
        }
    }
}

impl fmt::Debug for StageBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageBinding::{:?}", self.role())
    }
}

/// One schedulable unit of the pipeline
///
/// A stage never changes role, and its port layout is fixed at
/// construction. Lifecycle: `Uninitialized -> Initialized -> Running ->
/// Terminated`; `process` may be invoked any number of times while
/// running, and a failed message never terminates the stage.
pub struct PipelineStage {
    /// Stage identity within the graph
    id: StageId,

    /// Lifecycle state
    state: StageState,

    /// Configuration applied at init
    config: StageConfig,

    /// The bound processing capability
    binding: StageBinding,

    /// Context handed to every model run
    ctx: RunContext,

    /// Pool charged for buffers this stage allocates
    pool: Arc<MemoryPool>,
}

impl PipelineStage {
    /// Create a stage in the `Uninitialized` state
    pub fn new(
        id: StageId,
        config: StageConfig,
        binding: StageBinding,
        pool: Arc<MemoryPool>,
    ) -> Self {
        Self {
            id,
            state: StageState::Uninitialized,
            config,
            binding,
            ctx: RunContext::default(),
            pool,
        }
    }

    /// Stage identity
    pub fn id(&self) -> StageId {
        self.id
    }

    /// The role of the bound capability
    pub fn role(&self) -> StageRole {
        self.binding.role()
    }

    /// Current lifecycle state
    pub fn state(&self) -> StageState {
        self.state
    }

    /// One-time setup of the processing capability
    ///
    /// Failure here is fatal to graph startup.
    pub fn init(&mut self) -> Result<()> {
        if self.state != StageState::Uninitialized {
            return Err(Error::State(format!(
                "{} cannot init from {:?}",
                self.id, self.state
            )));
        }

        match &mut self.binding {
            StageBinding::Transform { adapter, plan } => {
                plan.source.validate()?;
                plan.dest.validate()?;
                adapter.init(&self.config)?;
            }
            StageBinding::Inference { runner } => runner.init(&self.config)?,
            StageBinding::Source | StageBinding::Sink { .. } => {}
        }

        self.ctx = RunContext::from_config(&self.config);
        self.state = StageState::Initialized;
        debug!(stage = %self.id, role = ?self.role(), "stage initialized");
        Ok(())
    }

    /// Begin accepting messages
    pub fn start(&mut self) -> Result<()> {
        if self.state != StageState::Initialized {
            return Err(Error::State(format!(
                "{} cannot start from {:?}",
                self.id, self.state
            )));
        }
        self.state = StageState::Running;
        Ok(())
    }

    /// Release the processing capability
    pub fn teardown(&mut self) -> Result<()> {
        match self.state {
            StageState::Initialized | StageState::Running => {
                self.state = StageState::Terminated;
                debug!(stage = %self.id, "stage terminated");
                Ok(())
            }
            _ => Err(Error::State(format!(
                "{} cannot tear down from {:?}",
                self.id, self.state
            ))),
        }
    }

    /// Handle one inbound message on `port`
    ///
    /// Produces zero or more messages through `emitter`. An error reports
    /// a dropped message; the stage remains running.
    pub fn process(
        &mut self,
        port: PortId,
        message: Message,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        if self.state != StageState::Running {
            return Err(Error::State(format!(
                "{} received a message while {:?}",
                self.id, self.state
            )));
        }
        if port.0 >= self.role().input_ports() {
            return Err(Error::UnwiredPort {
                stage: self.id,
                port,
            });
        }

        match &mut self.binding {
            StageBinding::Source => {
                expect_tag(&message, tags::FRAME)?;
                if message.payload().is_empty() {
                    return Err(Error::InvalidInput("empty payload".into()));
                }
                emitter.emit(PortId(0), message)
            }

            StageBinding::Transform { adapter, plan } => {
                expect_tag(&message, tags::FRAME)?;
                let expected = plan.expected_input_len();
                if message.payload().len() != expected {
                    return Err(Error::InvalidInput(format!(
                        "input size {} does not match expected {expected}",
                        message.payload().len()
                    )));
                }

                let output = match adapter.apply(
                    message.payload(),
                    &plan.source,
                    &plan.dest,
                    plan.input_format,
                    plan.output_format,
                ) {
                    Ok(output) => output,
                    Err(err @ Error::AllocationFailed { .. }) => return Err(err),
                    Err(err) => return Err(Error::Transform(err.to_string())),
                };

                emitter.emit(PortId(0), Message::new(tags::IMAGE, output))
            }

            StageBinding::Inference { runner } => {
                expect_tag(&message, tags::IMAGE)?;
                let inputs = vec![message.into_payload()];

                let descs = runner
                    .prepare_outputs(&inputs)
                    .map_err(|err| Error::Inference(err.to_string()))?;

                let mut outputs = Vec::with_capacity(descs.len());
                for desc in &descs {
                    outputs.push(Buffer::allocate(desc.byte_len(), &self.pool)?);
                }

                runner
                    .run(&self.ctx, &inputs, &mut outputs, None)
                    .map_err(|err| Error::Inference(err.to_string()))?;

                for output in outputs {
                    if let Err(err) = emitter.emit(PortId(0), Message::new(tags::TENSOR, output)) {
                        warn!(stage = %self.id, error = %err, "failed to send output tensor");
                    }
                }
                Ok(())
            }

            StageBinding::Sink {
                delivery,
                completion,
            } => {
                delivery.deliver(&message)?;
                completion.signal();
                Ok(())
            }
        }
    }
}

fn expect_tag(message: &Message, expected: &str) -> Result<()> {
    if message.type_tag() == expected {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "unexpected type tag {:?}, expected {expected:?}",
            message.type_tag()
        )))
    }
}
