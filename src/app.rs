//! The frame loop: initialize, one clear pass per frame, terminate.

use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::gpu::{GpuBackend, GpuHandles, SurfaceStatus};
use crate::observer::{DeviceObserver, LogObserver};
use crate::platform::Platform;
use crate::window::WindowHost;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    NotRunning,
    Running,
    FrameAcquired,
    FrameSubmitted,
    Terminated,
}

impl LoopState {
    pub fn can_enter(self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (NotRunning, Running)
                | (NotRunning, Terminated)
                | (Running, FrameAcquired)
                | (Running, Terminated)
                | (FrameAcquired, FrameSubmitted)
                | (FrameSubmitted, Running)
        )
    }

    fn enter(&mut self, next: LoopState) -> bool {
        use LoopState::*;
        if !self.can_enter(next) {
            log::error!("Refusing state transition {self:?} -> {next:?}");
            return false;
        }
        // Per-frame transitions happen every vsync; keep them out of debug output.
        if matches!(next, FrameAcquired | FrameSubmitted) || *self == FrameSubmitted {
            log::trace!("{self:?} -> {next:?}");
        } else {
            log::debug!("{self:?} -> {next:?}");
        }
        *self = next;
        true
    }
}

/// What one call to [`Application::main_loop`] did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    /// A command buffer was submitted.
    Submitted,
    /// The surface had no texture for us. Nothing was recorded.
    Skipped(SurfaceStatus),
    /// The window asked to close. No further frames will be processed.
    Closing,
    /// The application is not running.
    Idle,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FrameStats {
    pub frames_acquired: u64,
    pub frames_skipped: u64,
    pub submissions: u64,
    pub presentations: u64,
}

/// Owns the window and the persistent GPU handles and sequences every frame.
pub struct Application<W: WindowHost, B: GpuBackend> {
    config: AppConfig,
    observer: Arc<dyn DeviceObserver>,
    state: LoopState,
    close_observed: bool,
    gpu: Option<GpuHandles<B>>,
    window: Option<W>,
    stats: FrameStats,
}

impl<W: WindowHost, B: GpuBackend> Application<W, B> {
    pub fn new(config: AppConfig) -> Self {
        Self::with_observer(config, Arc::new(LogObserver))
    }

    pub fn with_observer(config: AppConfig, observer: Arc<dyn DeviceObserver>) -> Self {
        Self {
            config,
            observer,
            state: LoopState::NotRunning,
            close_observed: false,
            gpu: None,
            window: None,
            stats: FrameStats::default(),
        }
    }

    /// Opens the window and brings up the GPU.
    ///
    /// On error nothing is left running and the caller is expected to exit.
    pub fn initialize<P>(&mut self, platform: &mut P) -> Result<()>
    where
        P: Platform<Window = W, Backend = B>,
    {
        anyhow::ensure!(
            self.state == LoopState::NotRunning,
            "cannot initialize from state {:?}",
            self.state
        );

        let window = platform.create_window(&self.config)?;
        let gpu = platform.create_gpu(&window, &self.config, Arc::clone(&self.observer))?;
        self.attach(window, gpu)
    }

    /// Starts running with resources created elsewhere, e.g. by an async
    /// setup under a cooperative host.
    pub fn attach(&mut self, window: W, gpu: GpuHandles<B>) -> Result<()> {
        anyhow::ensure!(
            self.state.enter(LoopState::Running),
            "cannot start running from state {:?}",
            self.state
        );

        self.window = Some(window);
        self.gpu = Some(gpu);
        log::info!("Application initialized");
        Ok(())
    }

    /// Runs one iteration: poll events, then acquire, record, submit and
    /// present a frame.
    pub fn main_loop(&mut self) -> FrameOutcome {
        if !self.is_running() {
            return FrameOutcome::Idle;
        }

        let Self {
            config,
            state,
            close_observed,
            gpu,
            window,
            stats,
            ..
        } = self;
        let (Some(window), Some(gpu)) = (window.as_mut(), gpu.as_ref()) else {
            return FrameOutcome::Idle;
        };

        window.poll_events();
        if window.should_close() {
            log::info!("Window close requested");
            *close_observed = true;
            return FrameOutcome::Closing;
        }

        let texture = match B::current_texture(&gpu.surface) {
            Ok(texture) => texture,
            Err(status) => {
                log::debug!("Skipping frame: surface status {status}");
                stats.frames_skipped += 1;
                return FrameOutcome::Skipped(status);
            }
        };
        if !state.enter(LoopState::FrameAcquired) {
            return FrameOutcome::Idle;
        }
        stats.frames_acquired += 1;

        let view = B::create_view(&texture);
        let mut encoder = B::create_encoder(&gpu.device, &config.gpu.encoder_label);
        B::record_clear_pass(&mut encoder, &view, config.gpu.clear_color);
        let commands = B::finish(encoder);

        log::trace!("Submitting command...");
        B::submit(&gpu.queue, commands);
        stats.submissions += 1;
        log::trace!("Command submitted.");
        if !state.enter(LoopState::FrameSubmitted) {
            return FrameOutcome::Idle;
        }

        drop(view);
        if config.host.presents(gpu.implicit_present) {
            B::present(texture);
            stats.presentations += 1;
        } else {
            drop(texture);
        }
        if config.host.polls_device() {
            B::poll(&gpu.device);
        }
        if !state.enter(LoopState::Running) {
            return FrameOutcome::Idle;
        }

        FrameOutcome::Submitted
    }

    /// False before initialization, after termination, and as soon as a
    /// close request has been seen.
    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running && !self.close_observed
    }

    /// Releases queue, surface and device, then destroys the window and shuts
    /// down the windowing system. Calling it again does nothing.
    pub fn terminate(&mut self) {
        if self.state == LoopState::Terminated {
            return;
        }

        if let Some(gpu) = self.gpu.take() {
            gpu.release();
        }
        if let Some(window) = self.window.take() {
            window.destroy();
        }
        let terminated = self.state.enter(LoopState::Terminated);
        debug_assert!(terminated, "terminate called mid-frame");

        log::info!(
            "Terminated after {} frames ({} skipped)",
            self.stats.submissions,
            self.stats.frames_skipped
        );
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn observer(&self) -> Arc<dyn DeviceObserver> {
        Arc::clone(&self.observer)
    }
}

impl<W: WindowHost, B: GpuBackend> Drop for Application<W, B> {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::sync::Mutex;

    use super::*;
    use crate::config::HostMode;
    use crate::observer::{ErrorKind, LossReason};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateWindow,
        CreateGpu,
        PollEvents,
        AcquireTexture,
        CreateView,
        CreateEncoder,
        ClearPass(wgpu::Color),
        Finish,
        Submit { frame: usize, passes: Vec<wgpu::Color> },
        ReleaseView,
        Present,
        PollDevice,
        ReleaseQueue,
        ReleaseSurface,
        ReleaseDevice,
        DestroyWindow,
        ShutdownWindowing,
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct Mock;

    struct MockDevice {
        log: Log,
        encoders: Cell<usize>,
    }

    struct MockQueue {
        log: Log,
    }

    struct MockSurface {
        log: Log,
        statuses: RefCell<VecDeque<Result<(), SurfaceStatus>>>,
    }

    struct MockTexture {
        log: Log,
    }

    struct MockView {
        log: Log,
    }

    impl Drop for MockView {
        fn drop(&mut self) {
            self.log.borrow_mut().push(Call::ReleaseView);
        }
    }

    struct MockEncoder {
        log: Log,
        frame: usize,
        passes: Vec<wgpu::Color>,
    }

    struct MockCommands {
        frame: usize,
        passes: Vec<wgpu::Color>,
    }

    impl GpuBackend for Mock {
        type Device = MockDevice;
        type Queue = MockQueue;
        type Surface = MockSurface;
        type SurfaceTexture = MockTexture;
        type TextureView = MockView;
        type CommandEncoder = MockEncoder;
        type CommandBuffer = MockCommands;

        fn current_texture(surface: &MockSurface) -> Result<MockTexture, SurfaceStatus> {
            surface.log.borrow_mut().push(Call::AcquireTexture);
            let status = surface.statuses.borrow_mut().pop_front().unwrap_or(Ok(()));
            status.map(|()| MockTexture {
                log: Rc::clone(&surface.log),
            })
        }

        fn create_view(texture: &MockTexture) -> MockView {
            texture.log.borrow_mut().push(Call::CreateView);
            MockView {
                log: Rc::clone(&texture.log),
            }
        }

        fn create_encoder(device: &MockDevice, _label: &str) -> MockEncoder {
            device.log.borrow_mut().push(Call::CreateEncoder);
            let frame = device.encoders.get();
            device.encoders.set(frame + 1);
            MockEncoder {
                log: Rc::clone(&device.log),
                frame,
                passes: Vec::new(),
            }
        }

        fn record_clear_pass(encoder: &mut MockEncoder, _view: &MockView, color: wgpu::Color) {
            encoder.log.borrow_mut().push(Call::ClearPass(color));
            encoder.passes.push(color);
        }

        fn finish(encoder: MockEncoder) -> MockCommands {
            encoder.log.borrow_mut().push(Call::Finish);
            MockCommands {
                frame: encoder.frame,
                passes: encoder.passes,
            }
        }

        fn submit(queue: &MockQueue, commands: MockCommands) {
            queue.log.borrow_mut().push(Call::Submit {
                frame: commands.frame,
                passes: commands.passes,
            });
        }

        fn present(texture: MockTexture) {
            texture.log.borrow_mut().push(Call::Present);
        }

        fn poll(device: &MockDevice) {
            device.log.borrow_mut().push(Call::PollDevice);
        }

        fn release_queue(queue: MockQueue) {
            queue.log.borrow_mut().push(Call::ReleaseQueue);
        }

        fn release_surface(surface: MockSurface) {
            surface.log.borrow_mut().push(Call::ReleaseSurface);
        }

        fn release_device(device: MockDevice) {
            device.log.borrow_mut().push(Call::ReleaseDevice);
        }
    }

    struct MockWindow {
        log: Log,
        polls: usize,
        close_on_poll: Option<usize>,
    }

    impl WindowHost for MockWindow {
        fn poll_events(&mut self) {
            self.polls += 1;
            self.log.borrow_mut().push(Call::PollEvents);
        }

        fn should_close(&self) -> bool {
            self.close_on_poll.is_some_and(|n| self.polls >= n)
        }

        fn destroy(self) {
            let mut log = self.log.borrow_mut();
            log.push(Call::DestroyWindow);
            log.push(Call::ShutdownWindowing);
        }
    }

    #[derive(Default)]
    struct MockPlatform {
        log: Log,
        fail_window: bool,
        fail_instance: bool,
        close_on_poll: Option<usize>,
        statuses: Vec<Result<(), SurfaceStatus>>,
        implicit_present: bool,
        observer: Option<Arc<dyn DeviceObserver>>,
    }

    impl Platform for MockPlatform {
        type Window = MockWindow;
        type Backend = Mock;

        fn create_window(&mut self, _config: &AppConfig) -> Result<MockWindow> {
            anyhow::ensure!(!self.fail_window, "could not open window");
            self.log.borrow_mut().push(Call::CreateWindow);
            Ok(MockWindow {
                log: Rc::clone(&self.log),
                polls: 0,
                close_on_poll: self.close_on_poll,
            })
        }

        fn create_gpu(
            &mut self,
            _window: &MockWindow,
            _config: &AppConfig,
            observer: Arc<dyn DeviceObserver>,
        ) -> Result<GpuHandles<Mock>> {
            anyhow::ensure!(!self.fail_instance, "could not initialize WebGPU");
            self.log.borrow_mut().push(Call::CreateGpu);
            self.observer = Some(observer);
            Ok(GpuHandles {
                queue: MockQueue {
                    log: Rc::clone(&self.log),
                },
                surface: MockSurface {
                    log: Rc::clone(&self.log),
                    statuses: RefCell::new(self.statuses.drain(..).collect()),
                },
                device: MockDevice {
                    log: Rc::clone(&self.log),
                    encoders: Cell::new(0),
                },
                implicit_present: self.implicit_present,
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl DeviceObserver for RecordingObserver {
        fn device_lost(&self, reason: LossReason, message: &str) {
            self.events.lock().unwrap().push(format!("lost {reason}: {message}"));
        }

        fn uncaptured_error(&self, kind: ErrorKind, message: &str) {
            self.events.lock().unwrap().push(format!("error {kind}: {message}"));
        }
    }

    fn native_config() -> AppConfig {
        AppConfig {
            host: HostMode::Native,
            ..AppConfig::default()
        }
    }

    fn start(platform: &mut MockPlatform) -> Application<MockWindow, Mock> {
        let mut app = Application::new(native_config());
        app.initialize(platform).expect("initialize");
        app
    }

    fn count(log: &Log, pred: impl Fn(&Call) -> bool) -> usize {
        log.borrow().iter().filter(|call| pred(call)).count()
    }

    fn submitted_frames(log: &Log) -> Vec<usize> {
        log.borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Submit { frame, .. } => Some(*frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn initialize_enters_running() {
        let mut platform = MockPlatform::default();
        let app = start(&mut platform);
        assert_eq!(app.state(), LoopState::Running);
        assert!(app.is_running());
        assert_eq!(*platform.log.borrow(), vec![Call::CreateWindow, Call::CreateGpu]);
    }

    #[test]
    fn terminate_releases_in_reverse_order_exactly_once() {
        let mut platform = MockPlatform::default();
        let mut app = start(&mut platform);
        app.main_loop();
        app.terminate();
        app.terminate();
        drop(app);

        let log = platform.log.borrow();
        let teardown = &log[log.len() - 5..];
        assert_eq!(
            teardown,
            &[
                Call::ReleaseQueue,
                Call::ReleaseSurface,
                Call::ReleaseDevice,
                Call::DestroyWindow,
                Call::ShutdownWindowing,
            ]
        );
        for call in teardown {
            assert_eq!(log.iter().filter(|c| *c == call).count(), 1, "{call:?}");
        }
    }

    #[test]
    fn dropping_a_running_application_terminates_it() {
        let mut platform = MockPlatform::default();
        drop(start(&mut platform));
        assert_eq!(count(&platform.log, |c| *c == Call::ReleaseDevice), 1);
        assert_eq!(count(&platform.log, |c| *c == Call::ShutdownWindowing), 1);
    }

    #[test]
    fn successful_frame_records_one_clear_pass() {
        let mut platform = MockPlatform::default();
        let mut app = start(&mut platform);
        let color = app.config().gpu.clear_color;

        assert_eq!(app.main_loop(), FrameOutcome::Submitted);

        let log = platform.log.borrow();
        assert_eq!(
            &log[2..],
            &[
                Call::PollEvents,
                Call::AcquireTexture,
                Call::CreateView,
                Call::CreateEncoder,
                Call::ClearPass(color),
                Call::Finish,
                Call::Submit {
                    frame: 0,
                    passes: vec![color],
                },
                Call::ReleaseView,
                Call::Present,
                Call::PollDevice,
            ]
        );
        assert_eq!(app.state(), LoopState::Running);
    }

    #[test]
    fn outdated_surface_skips_the_frame() {
        let mut platform = MockPlatform {
            statuses: vec![Ok(()), Err(SurfaceStatus::Outdated)],
            ..MockPlatform::default()
        };
        let mut app = start(&mut platform);
        assert_eq!(app.main_loop(), FrameOutcome::Submitted);

        let before = app.stats();
        let encoders = count(&platform.log, |c| *c == Call::CreateEncoder);

        assert_eq!(
            app.main_loop(),
            FrameOutcome::Skipped(SurfaceStatus::Outdated)
        );

        let after = app.stats();
        assert_eq!(after.submissions, before.submissions);
        assert_eq!(after.frames_skipped, 1);
        assert_eq!(count(&platform.log, |c| *c == Call::CreateEncoder), encoders);
        assert_eq!(platform.log.borrow().last(), Some(&Call::AcquireTexture));
        assert_eq!(app.state(), LoopState::Running);
        assert!(app.is_running());
    }

    #[test]
    fn skipped_frames_submit_nothing() {
        let mut platform = MockPlatform {
            statuses: vec![
                Err(SurfaceStatus::Timeout),
                Err(SurfaceStatus::Lost),
                Err(SurfaceStatus::OutOfMemory),
            ],
            ..MockPlatform::default()
        };
        let mut app = start(&mut platform);
        for _ in 0..3 {
            assert!(matches!(app.main_loop(), FrameOutcome::Skipped(_)));
        }
        assert_eq!(count(&platform.log, |c| matches!(c, Call::Submit { .. })), 0);
        assert_eq!(count(&platform.log, |c| *c == Call::Present), 0);

        // The next iteration simply tries again.
        assert_eq!(app.main_loop(), FrameOutcome::Submitted);
    }

    #[test]
    fn five_frames_submit_five_buffers_in_order() {
        let mut platform = MockPlatform::default();
        let mut app = start(&mut platform);
        for _ in 0..5 {
            assert_eq!(app.main_loop(), FrameOutcome::Submitted);
        }

        assert_eq!(submitted_frames(&platform.log), vec![0, 1, 2, 3, 4]);
        assert_eq!(
            app.stats(),
            FrameStats {
                frames_acquired: 5,
                frames_skipped: 0,
                submissions: 5,
                presentations: 5,
            }
        );
    }

    #[test]
    fn close_request_stops_frame_processing() {
        let mut platform = MockPlatform {
            close_on_poll: Some(3),
            ..MockPlatform::default()
        };
        let mut app = start(&mut platform);

        assert_eq!(app.main_loop(), FrameOutcome::Submitted);
        assert_eq!(app.main_loop(), FrameOutcome::Submitted);
        assert!(app.is_running());

        assert_eq!(app.main_loop(), FrameOutcome::Closing);
        assert!(!app.is_running());

        let calls = platform.log.borrow().len();
        assert_eq!(app.main_loop(), FrameOutcome::Idle);
        assert_eq!(platform.log.borrow().len(), calls);
        assert_eq!(app.stats().submissions, 2);
    }

    #[test]
    fn instance_failure_fails_initialize() {
        let mut platform = MockPlatform {
            fail_instance: true,
            ..MockPlatform::default()
        };
        let mut app = Application::new(native_config());

        let err = app.initialize(&mut platform).unwrap_err();
        assert!(err.to_string().contains("WebGPU"));
        assert_eq!(app.state(), LoopState::NotRunning);
        assert!(!app.is_running());
        assert_eq!(app.main_loop(), FrameOutcome::Idle);
    }

    #[test]
    fn window_failure_fails_initialize_before_gpu_setup() {
        let mut platform = MockPlatform {
            fail_window: true,
            ..MockPlatform::default()
        };
        let mut app = Application::new(native_config());

        assert!(app.initialize(&mut platform).is_err());
        assert!(platform.log.borrow().is_empty());

        app.terminate();
        assert_eq!(app.state(), LoopState::Terminated);
        assert!(platform.log.borrow().is_empty());
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let mut platform = MockPlatform::default();
        let mut app = start(&mut platform);
        assert!(app.initialize(&mut platform).is_err());
        assert_eq!(count(&platform.log, |c| *c == Call::CreateWindow), 1);
    }

    #[test]
    fn cooperative_host_neither_presents_nor_polls() {
        let mut platform = MockPlatform {
            implicit_present: true,
            ..MockPlatform::default()
        };
        let mut app = Application::new(AppConfig {
            host: HostMode::Cooperative,
            ..AppConfig::default()
        });
        app.initialize(&mut platform).expect("initialize");

        for _ in 0..3 {
            assert_eq!(app.main_loop(), FrameOutcome::Submitted);
        }
        assert_eq!(count(&platform.log, |c| *c == Call::Present), 0);
        assert_eq!(count(&platform.log, |c| *c == Call::PollDevice), 0);
        assert_eq!(app.stats().submissions, 3);
        assert_eq!(app.stats().presentations, 0);
    }

    #[test]
    fn cooperative_host_presents_when_the_surface_needs_it() {
        // WebGL canvases are only updated by an explicit present.
        let mut platform = MockPlatform {
            implicit_present: false,
            ..MockPlatform::default()
        };
        let mut app = Application::new(AppConfig {
            host: HostMode::Cooperative,
            ..AppConfig::default()
        });
        app.initialize(&mut platform).expect("initialize");

        for _ in 0..3 {
            assert_eq!(app.main_loop(), FrameOutcome::Submitted);
        }
        assert_eq!(count(&platform.log, |c| *c == Call::Present), 3);
        assert_eq!(count(&platform.log, |c| *c == Call::PollDevice), 0);
        assert_eq!(app.stats().presentations, 3);
    }

    #[test]
    fn device_notifications_do_not_stop_the_loop() {
        let observer = Arc::new(RecordingObserver::default());
        let mut platform = MockPlatform::default();
        let mut app = Application::with_observer(native_config(), observer.clone());
        app.initialize(&mut platform).expect("initialize");

        let forwarded = platform.observer.clone().expect("observer handed to setup");
        forwarded.uncaptured_error(ErrorKind::Validation, "bad descriptor");
        forwarded.device_lost(LossReason::Unknown, "driver reset");

        assert_eq!(app.main_loop(), FrameOutcome::Submitted);
        assert!(app.is_running());
        assert_eq!(
            *observer.events.lock().unwrap(),
            vec![
                "error validation: bad descriptor".to_string(),
                "lost unknown: driver reset".to_string(),
            ]
        );
    }

    #[test]
    fn loop_state_transitions_are_guarded() {
        assert!(LoopState::NotRunning.can_enter(LoopState::Running));
        assert!(LoopState::Running.can_enter(LoopState::FrameAcquired));
        assert!(LoopState::FrameAcquired.can_enter(LoopState::FrameSubmitted));
        assert!(LoopState::FrameSubmitted.can_enter(LoopState::Running));
        assert!(LoopState::Running.can_enter(LoopState::Terminated));

        assert!(!LoopState::NotRunning.can_enter(LoopState::FrameAcquired));
        assert!(!LoopState::FrameAcquired.can_enter(LoopState::Terminated));
        assert!(!LoopState::Terminated.can_enter(LoopState::Running));

        let mut state = LoopState::Terminated;
        assert!(!state.enter(LoopState::Running));
        assert_eq!(state, LoopState::Terminated);
    }

    #[test]
    fn interrupted_frame_does_not_start_another() {
        let mut platform = MockPlatform::default();
        let mut app = start(&mut platform);
        let calls_before = platform.log.borrow().len();

        // FrameAcquired cannot be entered from here.
        app.state = LoopState::FrameSubmitted;
        assert_eq!(app.main_loop(), FrameOutcome::Idle);

        assert_eq!(platform.log.borrow().len(), calls_before);
        assert_eq!(app.stats(), FrameStats::default());
        assert_eq!(app.state(), LoopState::FrameSubmitted);

        app.state = LoopState::Running;
        app.terminate();
    }
}
