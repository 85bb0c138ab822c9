#![no_std]
#![no_main]

use core::{convert::Infallible, panic};
use drive_envoy::{
    Result,
    command::CommandRequest,
    controller::{MotorController, MotorControllerStatic},
    motion::MotionKind,
    pwm_port::rp_pwm::{pwm_config, pwm_port_from_slices},
};
use embassy_executor::Spawner;
use embassy_rp::pwm::Pwm;
use embassy_time::{Duration, Timer};
use {defmt::info, defmt_rtt as _, panic_probe as _};

static MOTOR_CONTROLLER_STATIC: MotorControllerStatic = MotorController::new_static();

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // Left motor on GPIO 0/1 (slice 0), right motor on GPIO 2/3 (slice 1)
    let left = Pwm::new_output_ab(p.PWM_SLICE0, p.PIN_0, p.PIN_1, pwm_config());
    let right = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, pwm_config());
    let pwm_port = pwm_port_from_slices(left, right)?;
    let motors = MotorController::new(&MOTOR_CONTROLLER_STATIC, pwm_port, spawner)?;

    motors.set_speed(160).await;

    loop {
        // One side and one corner per pair; the scheduler runs them back to back.
        for kind in [
            MotionKind::Forward,
            MotionKind::Left,
            MotionKind::Forward,
            MotionKind::Left,
        ] {
            let reply = motors.submit(CommandRequest::new(kind, None)).await;
            info!("{} -> {} (queue {})", kind, reply.outcome, reply.queue_depth);
        }

        // Two sides and two corners: 2 * (1.5 s + 0.4 s), plus slack.
        Timer::after(Duration::from_millis(4_000)).await;
        let diagnostics = motors.diagnostics();
        info!(
            "state={} received={} dropped={}",
            diagnostics.current_state.wire_name(),
            diagnostics.stats.total_received,
            diagnostics.stats.dropped
        );

        // Back up briefly; the reversal dead-time is handled for us.
        let reply = motors
            .submit(CommandRequest::new(MotionKind::Backward, Some(120)))
            .await;
        info!("backward -> {}", reply.outcome);
        Timer::after(Duration::from_millis(300)).await;
        motors.stop().await;
        Timer::after(Duration::from_millis(500)).await;
    }
}
