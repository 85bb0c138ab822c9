//! A device abstraction that owns the motors and runs the scheduler in its own task.
//!
//! Network handlers (or anything else) talk to the motors through a [`MotorController`]
//! handle. Every request travels over a channel to a single background task that owns the
//! [`CommandScheduler`], so the scheduler never needs a lock and interrupt-driven networking
//! never touches motor state directly.
//!
//! # Example
//!
//! ```rust,no_run
//! # #![no_std]
//! # #![no_main]
//! # use panic_probe as _;
//! # use core::convert::Infallible;
//! # use core::default::Default;
//! # use core::result::Result::Ok;
//! use drive_envoy::Result;
//! use drive_envoy::command::CommandRequest;
//! use drive_envoy::controller::{MotorController, MotorControllerStatic};
//! use drive_envoy::motion::MotionKind;
//! use drive_envoy::pwm_port::rp_pwm::{pwm_config, pwm_port_from_slices};
//! use embassy_rp::pwm::Pwm;
//!
//! static MOTOR_CONTROLLER_STATIC: MotorControllerStatic = MotorController::new_static();
//!
//! # #[embassy_executor::main]
//! # async fn main(spawner: embassy_executor::Spawner) -> ! {
//! #     let err = example(spawner).await.unwrap_err();
//! #     core::panic!("{err}");
//! # }
//! async fn example(spawner: embassy_executor::Spawner) -> Result<Infallible> {
//!     let p = embassy_rp::init(Default::default());
//!     let left = Pwm::new_output_ab(p.PWM_SLICE0, p.PIN_0, p.PIN_1, pwm_config());
//!     let right = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, pwm_config());
//!     let pwm_port = pwm_port_from_slices(left, right)?;
//!     let motors = MotorController::new(&MOTOR_CONTROLLER_STATIC, pwm_port, spawner)?;
//!
//!     let reply = motors
//!         .submit(CommandRequest::new(MotionKind::Forward, Some(150)))
//!         .await;
//!     defmt::info!("forward: {}", reply.outcome);
//!
//!     core::future::pending().await // run forever
//! }
//! ```

use core::cell::Cell;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker};
use static_cell::StaticCell;

use crate::Result;
use crate::command::{CommandReply, CommandRequest};
use crate::motion::MotionKind;
use crate::pwm_port::PwmOutput;
use crate::pwm_port::rp_pwm::RpPwmPort;
use crate::scheduler::{CommandScheduler, Diagnostics};

/// How often the device loop checks auto-stop and dead-time deadlines.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

/// Messages sent to the device loop.
enum ControllerRequest {
    Command(CommandRequest),
    SetSpeed(u8),
}

/// Static resources for [`MotorController`].
pub struct MotorControllerStatic {
    requests: Channel<CriticalSectionRawMutex, ControllerRequest, 1>,
    replies: Signal<CriticalSectionRawMutex, CommandReply>,
    // Held for a whole request/reply exchange so replies cannot cross.
    exchange: Mutex<CriticalSectionRawMutex, ()>,
    diagnostics: BlockingMutex<CriticalSectionRawMutex, Cell<Diagnostics>>,
}

impl MotorControllerStatic {
    /// Create static resources for the motor controller.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            requests: Channel::new(),
            replies: Signal::new(),
            exchange: Mutex::new(()),
            diagnostics: BlockingMutex::new(Cell::new(Diagnostics::at_rest())),
        }
    }

    fn publish(&self, diagnostics: Diagnostics) {
        self.diagnostics.lock(|cell| cell.set(diagnostics));
    }
}

/// Handle to the motor task.
///
/// See the [controller module documentation](mod@crate::controller) for usage.
pub struct MotorController {
    controller_static: &'static MotorControllerStatic,
}

static MOTOR_CONTROLLER_CELL: StaticCell<MotorController> = StaticCell::new();

impl MotorController {
    /// Create static resources for the motor controller.
    #[must_use]
    pub const fn new_static() -> MotorControllerStatic {
        MotorControllerStatic::new_static()
    }

    /// Spawn the motor task on `pwm_port` and return its handle.
    ///
    /// Only one controller may exist; a second call panics when claiming the handle cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskSpawn`](crate::Error::TaskSpawn) if the task is already running.
    pub fn new(
        controller_static: &'static MotorControllerStatic,
        pwm_port: RpPwmPort<'static>,
        spawner: embassy_executor::Spawner,
    ) -> Result<&'static Self> {
        let token = motor_controller_task(controller_static, pwm_port);
        spawner.spawn(token)?;
        Ok(MOTOR_CONTROLLER_CELL.init(Self { controller_static }))
    }

    /// Submit a motion request and wait for the scheduler's answer.
    ///
    /// Waits only for the task to pick the request up; the motion itself runs in the
    /// background.
    pub async fn submit(&self, request: CommandRequest) -> CommandReply {
        let _exchange = self.controller_static.exchange.lock().await;
        self.controller_static.replies.reset();
        self.controller_static
            .requests
            .send(ControllerRequest::Command(request))
            .await;
        self.controller_static.replies.wait().await
    }

    /// Stop the motors, discarding anything queued.
    pub async fn stop(&self) -> CommandReply {
        self.submit(CommandRequest::new(MotionKind::Stopped, Some(0)))
            .await
    }

    /// Change the speed used by requests that do not name one.
    pub async fn set_speed(&self, speed: u8) {
        let _exchange = self.controller_static.exchange.lock().await;
        self.controller_static
            .requests
            .send(ControllerRequest::SetSpeed(speed))
            .await;
    }

    /// Latest scheduler snapshot. Never waits.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        self.controller_static.diagnostics.lock(Cell::get)
    }
}

#[embassy_executor::task]
async fn motor_controller_task(
    controller_static: &'static MotorControllerStatic,
    pwm_port: RpPwmPort<'static>,
) -> ! {
    device_loop(controller_static, pwm_port).await
}

async fn device_loop<P: PwmOutput>(
    controller_static: &'static MotorControllerStatic,
    pwm_port: P,
) -> ! {
    let mut scheduler: CommandScheduler<P> = CommandScheduler::new(pwm_port, Instant::now());
    let mut ticker = Ticker::every(TICK_PERIOD);
    info!("motor controller running, tick {} ms", TICK_PERIOD.as_millis());

    loop {
        controller_static.publish(scheduler.diagnostics());
        match select(controller_static.requests.receive(), ticker.next()).await {
            Either::First(ControllerRequest::Command(request)) => {
                let reply = scheduler.submit_request(&request, Instant::now());
                controller_static.replies.signal(reply);
            }
            Either::First(ControllerRequest::SetSpeed(speed)) => {
                scheduler.set_default_speed(speed);
            }
            Either::Second(()) => {}
        }
        // Deadlines are checked after requests too, not only on ticker beats.
        scheduler.on_tick(Instant::now());
    }
}
