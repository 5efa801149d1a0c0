//! Mock backend that records every call into a shared event log.
//!
//! The GPU is simulated by fences: a submit leaves its fence pending until
//! someone waits on it (or the device is drained), so the log shows exactly
//! how far the CPU ran ahead. Misuse the real driver would not report (reusing
//! a target that is still being rendered, waiting on a fence that can never
//! signal) is collected in [`MockState::violations`].

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use frameloop_core::{PresentationSurface, RendererConfig, ResizeFlag, SurfaceExtent};
use frameloop_renderer::{
    Acquired, CommandRecorder, ErrorKind, FrameContext, FrameOrchestrator, PresentTargets,
    RecordContext, RenderBackend, SurfaceStatus, UniformUpdater,
};

pub type Shared = Rc<RefCell<MockState>>;

pub type TestOrchestrator = FrameOrchestrator<MockBackend, MockRecorder, MockUpdater>;

pub const UNIFORM_SIZE: u64 = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Create(&'static str, u64),
    Destroy(&'static str, u64),
    WaitFence(u64),
    ResetFence(u64),
    WaitIdle,
    Acquire,
    Submit { target: u32, fence: u64 },
    Present { target: u32 },
    WriteUniforms { target: usize },
    WaitEvents,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("out of memory in {0}")]
    OutOfMemory(&'static str),
    #[error("device lost in {0}")]
    DeviceLost(&'static str),
    #[error("invalid use: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default)]
struct FenceState {
    signaled: bool,
    /// Target of the submission this fence is waiting for.
    pending: Option<u32>,
}

#[derive(Default)]
pub struct MockState {
    next_id: u64,
    pub events: Vec<Event>,
    pub live: HashMap<u64, &'static str>,
    fences: HashMap<u64, FenceState>,
    pub max_pending: usize,
    pub violations: Vec<String>,
    /// Scripted acquisitions; round-robin over the targets when empty.
    pub acquire_script: VecDeque<Acquired>,
    pub present_script: VecDeque<SurfaceStatus>,
    next_index: u32,
    pub target_count: usize,
    /// Pipeline key reported by `pipeline_requirements`.
    pub format: u32,
    /// Operation or resource kind that fails with out-of-memory.
    pub fail_on: Option<&'static str>,
    pub device_lost_on: Option<&'static str>,
}

impl MockState {
    pub fn pending(&self) -> usize {
        self.fences.values().filter(|f| f.pending.is_some()).count()
    }

    pub fn is_live(&self, id: u64) -> bool {
        self.live.contains_key(&id)
    }

    pub fn live_count(&self, kind: &str) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    /// Kinds of every object destroyed from event `from` on, in order.
    pub fn destroyed_kinds(&self, from: usize) -> Vec<&'static str> {
        self.events[from..]
            .iter()
            .filter_map(|e| match e {
                Event::Destroy(kind, _) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn created_kinds(&self, from: usize) -> Vec<&'static str> {
        self.events[from..]
            .iter()
            .filter_map(|e| match e {
                Event::Create(kind, _) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn check(&self, op: &'static str) -> Result<(), MockError> {
        if self.fail_on == Some(op) {
            return Err(MockError::OutOfMemory(op));
        }
        if self.device_lost_on == Some(op) {
            return Err(MockError::DeviceLost(op));
        }
        Ok(())
    }

    fn target_in_use(&self, target: u32) -> bool {
        self.fences.values().any(|f| f.pending == Some(target))
    }
}

/// A backend object; dropping it logs its destruction.
pub struct MockObject {
    pub kind: &'static str,
    pub id: u64,
    state: Shared,
}

impl Drop for MockObject {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live.remove(&self.id);
        state.events.push(Event::Destroy(self.kind, self.id));
    }
}

pub struct MockTargets {
    pub extent: SurfaceExtent,
    pub count: usize,
    pub object: MockObject,
}

impl PresentTargets for MockTargets {
    fn len(&self) -> usize {
        self.count
    }

    fn extent(&self) -> SurfaceExtent {
        self.extent
    }
}

pub struct MockPipeline {
    pub key: u32,
    pub object: MockObject,
}

pub struct MockResources {
    pub count: usize,
    pub size: u64,
    pub object: MockObject,
}

/// Commands recorded for one target, with the ids of everything they bind.
pub struct MockCommands {
    pub target: u32,
    pub generation: u64,
    pub binds: Vec<u64>,
    pub object: MockObject,
}

pub struct MockBackend {
    state: Shared,
}

impl MockBackend {
    pub fn new() -> (Self, Shared) {
        let state = Rc::new(RefCell::new(MockState {
            target_count: 3,
            format: 44,
            ..MockState::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    pub fn object(&self, kind: &'static str) -> MockObject {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id, kind);
        state.events.push(Event::Create(kind, id));
        MockObject {
            kind,
            id,
            state: self.state.clone(),
        }
    }

    fn create(&self, kind: &'static str) -> Result<MockObject, MockError> {
        self.state.borrow().check(kind)?;
        Ok(self.object(kind))
    }

    pub fn record(&self, ctx: &RecordContext<'_, Self>) -> Result<MockCommands, MockError> {
        if ctx.index() >= ctx.framebuffers.count || ctx.index() >= ctx.descriptors.count {
            return Err(MockError::Invalid(format!("no bindings for {}", ctx.target)));
        }
        let object = self.create("command buffer")?;
        Ok(MockCommands {
            target: ctx.target.index(),
            generation: ctx.target.generation(),
            binds: vec![
                ctx.targets.object.id,
                ctx.attachments.id,
                ctx.pipeline.object.id,
                ctx.framebuffers.object.id,
                ctx.descriptors.object.id,
            ],
            object,
        })
    }
}

impl RenderBackend for MockBackend {
    type Error = MockError;
    type Semaphore = MockObject;
    type Fence = MockObject;
    type Targets = MockTargets;
    type Attachments = MockObject;
    type PipelineKey = u32;
    type Pipeline = MockPipeline;
    type Framebuffers = MockResources;
    type UniformBuffers = MockResources;
    type Descriptors = MockResources;
    type CommandBuffer = MockCommands;

    fn error_kind(error: &MockError) -> ErrorKind {
        match error {
            MockError::OutOfMemory(_) => ErrorKind::ResourceExhaustion,
            MockError::DeviceLost(_) => ErrorKind::Device,
            MockError::Invalid(_) => ErrorKind::ContractViolation,
        }
    }

    fn create_semaphore(&self) -> Result<MockObject, MockError> {
        self.create("semaphore")
    }

    fn create_fence(&self, signaled: bool) -> Result<MockObject, MockError> {
        let fence = self.create("fence")?;
        self.state.borrow_mut().fences.insert(
            fence.id,
            FenceState {
                signaled,
                pending: None,
            },
        );
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: &MockObject, _timeout_ns: u64) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        state.check("wait fence")?;
        let entry = state.fences.entry(fence.id).or_default();
        if entry.pending.take().is_some() {
            entry.signaled = true;
        }
        if !entry.signaled {
            let message = format!("fence {} waited on but can never signal", fence.id);
            state.violations.push(message.clone());
            return Err(MockError::Invalid(message));
        }
        state.events.push(Event::WaitFence(fence.id));
        Ok(())
    }

    fn reset_fence(&self, fence: &MockObject) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        let entry = state.fences.entry(fence.id).or_default();
        if entry.pending.is_some() {
            state
                .violations
                .push(format!("fence {} reset while pending", fence.id));
        }
        state.fences.entry(fence.id).or_default().signaled = false;
        state.events.push(Event::ResetFence(fence.id));
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        state.check("wait idle")?;
        for fence in state.fences.values_mut() {
            if fence.pending.take().is_some() {
                fence.signaled = true;
            }
        }
        state.events.push(Event::WaitIdle);
        Ok(())
    }

    fn create_targets(&self, extent: SurfaceExtent) -> Result<MockTargets, MockError> {
        let object = self.create("targets")?;
        let mut state = self.state.borrow_mut();
        state.next_index = 0;
        Ok(MockTargets {
            extent,
            count: state.target_count,
            object,
        })
    }

    fn acquire_next(
        &self,
        targets: &MockTargets,
        _ready: &MockObject,
        _timeout_ns: u64,
    ) -> Result<Acquired, MockError> {
        let mut state = self.state.borrow_mut();
        state.check("acquire")?;
        state.events.push(Event::Acquire);
        if let Some(acquired) = state.acquire_script.pop_front() {
            return Ok(acquired);
        }
        let index = state.next_index % targets.count as u32;
        state.next_index += 1;
        Ok(Acquired {
            index,
            status: SurfaceStatus::Optimal,
        })
    }

    fn submit(
        &self,
        commands: &MockCommands,
        _wait: &MockObject,
        _signal: &MockObject,
        fence: &MockObject,
    ) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        state.check("submit")?;
        if state.target_in_use(commands.target) {
            state.violations.push(format!(
                "target {} submitted while an earlier frame still renders it",
                commands.target
            ));
        }
        let entry = state.fences.entry(fence.id).or_default();
        if entry.signaled || entry.pending.is_some() {
            state
                .violations
                .push(format!("fence {} submitted without a reset", fence.id));
        }
        state.fences.entry(fence.id).or_default().pending = Some(commands.target);
        let pending = state.pending();
        state.max_pending = state.max_pending.max(pending);
        state.events.push(Event::Submit {
            target: commands.target,
            fence: fence.id,
        });
        Ok(())
    }

    fn present(
        &self,
        _targets: &MockTargets,
        index: u32,
        _wait: &MockObject,
    ) -> Result<SurfaceStatus, MockError> {
        let mut state = self.state.borrow_mut();
        state.check("present")?;
        state.events.push(Event::Present { target: index });
        Ok(state
            .present_script
            .pop_front()
            .unwrap_or(SurfaceStatus::Optimal))
    }

    fn pipeline_requirements(&self) -> Result<u32, MockError> {
        let state = self.state.borrow();
        state.check("requirements")?;
        Ok(state.format)
    }

    fn create_attachments(&self, _targets: &MockTargets) -> Result<MockObject, MockError> {
        self.create("attachments")
    }

    fn create_pipeline(&self, key: &u32) -> Result<MockPipeline, MockError> {
        Ok(MockPipeline {
            key: *key,
            object: self.create("pipeline")?,
        })
    }

    fn create_framebuffers(
        &self,
        targets: &MockTargets,
        _attachments: &MockObject,
    ) -> Result<MockResources, MockError> {
        Ok(MockResources {
            count: targets.count,
            size: 0,
            object: self.create("framebuffers")?,
        })
    }

    fn create_uniform_buffers(&self, count: usize, size: u64) -> Result<MockResources, MockError> {
        Ok(MockResources {
            count,
            size,
            object: self.create("uniform buffers")?,
        })
    }

    fn create_descriptors(&self, uniforms: &MockResources) -> Result<MockResources, MockError> {
        Ok(MockResources {
            count: uniforms.count,
            size: 0,
            object: self.create("descriptors")?,
        })
    }

    fn write_uniforms(
        &self,
        uniforms: &MockResources,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        if index >= uniforms.count || bytes.len() as u64 != uniforms.size {
            return Err(MockError::Invalid(format!(
                "uniform write of {} bytes to buffer {}",
                bytes.len(),
                index
            )));
        }
        if state.target_in_use(index as u32) {
            state.violations.push(format!(
                "uniforms of target {} written while an earlier frame still reads them",
                index
            ));
        }
        state.events.push(Event::WriteUniforms { target: index });
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRecorder {
    pub recorded: usize,
}

impl CommandRecorder<MockBackend> for MockRecorder {
    fn record(
        &mut self,
        backend: &MockBackend,
        ctx: &RecordContext<'_, MockBackend>,
    ) -> Result<MockCommands, MockError> {
        self.recorded += 1;
        backend.record(ctx)
    }
}

#[derive(Default)]
pub struct MockUpdater {
    pub frames: Vec<FrameContext>,
}

impl UniformUpdater for MockUpdater {
    fn uniform_size(&self) -> u64 {
        UNIFORM_SIZE
    }

    fn uniform_bytes(&mut self, ctx: &FrameContext) -> Vec<u8> {
        self.frames.push(*ctx);
        let mut bytes = vec![0u8; UNIFORM_SIZE as usize];
        bytes[..8].copy_from_slice(&ctx.frame_number.to_le_bytes());
        bytes
    }
}

/// A window whose size the test controls.
pub struct MockSurface {
    pub extent: SurfaceExtent,
    /// Extents reported after each successive `wait_events`. When empty,
    /// waiting closes the window.
    pub after_wait: VecDeque<SurfaceExtent>,
    pub resized: ResizeFlag,
    pub closed: bool,
    state: Shared,
}

impl MockSurface {
    pub fn new(width: u32, height: u32, state: &Shared) -> Self {
        Self {
            extent: SurfaceExtent::new(width, height),
            after_wait: VecDeque::new(),
            resized: ResizeFlag::new(),
            closed: false,
            state: state.clone(),
        }
    }

    /// Changes the size and raises the resize flag, as a window event would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = SurfaceExtent::new(width, height);
        self.resized.raise();
    }
}

impl PresentationSurface for MockSurface {
    fn extent(&self) -> SurfaceExtent {
        self.extent
    }

    fn wait_events(&mut self) {
        self.state.borrow_mut().events.push(Event::WaitEvents);
        match self.after_wait.pop_front() {
            Some(extent) => self.extent = extent,
            None => self.closed = true,
        }
    }

    fn take_resized(&mut self) -> bool {
        self.resized.take()
    }

    fn close_requested(&self) -> bool {
        self.closed
    }
}

pub fn config(frames_in_flight: usize) -> Arc<RendererConfig> {
    Arc::new(RendererConfig {
        frames_in_flight,
        ..RendererConfig::default()
    })
}

/// A mock backend with `targets` targets, plus a visible 800x600 surface.
pub fn setup(targets: usize) -> (MockBackend, MockSurface, Shared) {
    let (backend, state) = MockBackend::new();
    state.borrow_mut().target_count = targets;
    let surface = MockSurface::new(800, 600, &state);
    (backend, surface, state)
}

pub fn orchestrator(
    frames_in_flight: usize,
    targets: usize,
) -> (TestOrchestrator, MockSurface, Shared) {
    let (backend, mut surface, state) = setup(targets);
    let orchestrator = FrameOrchestrator::new(
        backend,
        MockRecorder::default(),
        MockUpdater::default(),
        config(frames_in_flight),
        &mut surface,
    )
    .expect("orchestrator");
    (orchestrator, surface, state)
}
