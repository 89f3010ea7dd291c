//! Mixed-Signal Example
//!
//! Demonstrates nestor with two small models:
//! - A tank whose level is integrated in continuous time inside a
//!   discrete-event controller. The controller opens the inflow valve,
//!   hears the level alarm, and vents the tank after an inspection. The
//!   vent command arrives while the tank has already run ahead, so the
//!   continuous subsystem rolls back and catches up.
//! - Three periodic tasks sharing one processor under earliest-deadline-
//!   first scheduling.
//!
//! Set `RUST_LOG=debug` to watch the directors at work.

use nestor_core::{ActorBody, ActorContext, Director, EventDirector, Kernel, Manager, Result, Time};
use nestor_ct::{Constant, Integrator, MixedSignalConfig, MixedSignalDirector, ThresholdDetector};
use nestor_sched::{EdfConfig, EdfDirector};
use tracing_subscriber::EnvFilter;

const PLANT_CONFIG: &str = "(stop_time: 4.0, run_ahead_length: 1.0, step_size: 0.1)";

const TASKS_CONFIG: &str = r#"(
    stop_time: 12.0,
    tasks: {
        "sensor": (relative_deadline: Some(2.0), execution_time: 0.5),
        "control": (relative_deadline: Some(3.0), execution_time: 1.0),
        "logger": (execution_time: 1.5),
    },
)"#;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Announces inspections at fixed times
#[derive(Debug)]
struct Inspector {
    times: Vec<Time>,
}

impl ActorBody for Inspector {
    fn initialize(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        for t in &self.times {
            cx.fire_at(*t)?;
        }
        Ok(())
    }

    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        println!("  t = {:.2}  inspection", cx.time());
        let out = cx.port("out")?;
        cx.send(out, cx.time())?;
        Ok(())
    }
}

/// Sets the inflow rate on a schedule, and vents the tank some time after
/// each inspection
#[derive(Debug)]
struct Valve {
    commands: Vec<(Time, f64)>,
    reaction_delay: f64,
    vent_rate: f64,
}

impl ActorBody for Valve {
    fn initialize(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        for (t, _) in &self.commands {
            cx.fire_at(*t)?;
        }
        Ok(())
    }

    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        let now = cx.time();
        let inspect = cx.port("inspect")?;
        while cx.has_token(inspect)? {
            cx.get(inspect)?;
            let at = now + self.reaction_delay;
            self.commands.push((at, self.vent_rate));
            cx.fire_at(at)?;
        }

        let resolution = cx.resolution();
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.commands)
            .into_iter()
            .partition(|(t, _)| resolution.equal(*t, now));
        self.commands = later;
        let out = cx.port("out")?;
        for (_, rate) in due {
            println!("  t = {now:.2}  inflow set to {rate:+.1}");
            cx.send(out, rate)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AlarmPrinter;

impl ActorBody for AlarmPrinter {
    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        let input = cx.port("in")?;
        while cx.has_token(input)? {
            let event = cx.get_event(input)?;
            let level = event.token.as_float().unwrap_or_default();
            println!("  t = {:.2}  ALARM: level {level:.2}", event.time);
        }
        Ok(())
    }
}

fn run_tank() -> Result<()> {
    println!("--- Tank level ---\n");

    let mut kernel = Kernel::default();
    let top = kernel.add_top_level("controller")?;
    kernel.set_director(top, EventDirector::new("de").with_stop_time(4.0))?;

    let inspector = kernel.add_actor(top, "inspector", Inspector { times: vec![2.5] })?;
    let inspector_out = kernel.add_output(inspector, "out")?;
    let valve = kernel.add_actor(
        top,
        "valve",
        Valve {
            commands: vec![(1.0, 2.0)],
            reaction_delay: 0.2,
            vent_rate: -1.0,
        },
    )?;
    let valve_inspect = kernel.add_input(valve, "inspect")?;
    let valve_out = kernel.add_output(valve, "out")?;

    let tank = kernel.add_composite(top, "tank")?;
    let tank_inflow = kernel.add_input(tank, "inflow")?;
    let tank_alarm = kernel.add_output(tank, "alarm")?;
    let config = MixedSignalConfig::from_ron(PLANT_CONFIG)?;
    let ct = kernel.set_director(tank, MixedSignalDirector::new("ct", config))?;

    let rate = kernel.add_actor(tank, "rate", Constant::new(1.0))?;
    let rate_set = kernel.add_input(rate, "set")?;
    let rate_out = kernel.add_output(rate, "out")?;
    let level = kernel.add_actor(tank, "level", Integrator::new(0.0))?;
    let level_in = kernel.add_input(level, "in")?;
    let level_out = kernel.add_output(level, "out")?;
    let high = kernel.add_actor(tank, "high", ThresholdDetector::new(1.75))?;
    let high_in = kernel.add_input(high, "in")?;
    let high_out = kernel.add_output(high, "out")?;

    let printer = kernel.add_actor(top, "printer", AlarmPrinter)?;
    let printer_in = kernel.add_input(printer, "in")?;

    kernel.connect(inspector_out, valve_inspect)?;
    kernel.connect(valve_out, tank_inflow)?;
    kernel.connect(tank_inflow, rate_set)?;
    kernel.connect(rate_out, level_in)?;
    kernel.connect(level_out, high_in)?;
    kernel.connect(high_out, tank_alarm)?;
    kernel.connect(tank_alarm, printer_in)?;

    let mut manager = Manager::new(kernel, top);
    let report = manager.run()?;

    if let Some(director) = manager.kernel().director_as::<MixedSignalDirector>(ct) {
        println!("\nTank finished at local time {:.2}", director.current_time());
        println!("  rollbacks: {}", director.rollback_count());
        if let Some(t) = director.known_good_time() {
            println!("  last known-good state: {t:.2}");
        }
    }
    println!("  controller iterations: {}\n", report.iterations);
    Ok(())
}

/// A task released every `period` until `horizon`
#[derive(Debug)]
struct Periodic {
    period: f64,
    horizon: Time,
    next_release: Time,
}

impl Periodic {
    fn new(period: f64, horizon: Time) -> Self {
        Self {
            period,
            horizon,
            next_release: 0.0,
        }
    }
}

impl ActorBody for Periodic {
    fn initialize(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        self.next_release = 0.0;
        cx.fire_at(self.next_release)
    }

    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        let name = cx.graph().actor(cx.actor())?.name.clone();
        println!("  t = {:5.2}  {name} done", cx.time());
        self.next_release += self.period;
        if self.next_release < self.horizon {
            cx.fire_at(self.next_release)?;
        }
        Ok(())
    }
}

fn run_tasks() -> Result<()> {
    println!("--- EDF task set ---\n");

    let config = EdfConfig::from_ron(TASKS_CONFIG)?;
    let horizon = config.stop_time;
    let mut kernel = Kernel::default();
    let top = kernel.add_top_level("processor")?;
    kernel.add_actor(top, "sensor", Periodic::new(2.0, horizon))?;
    kernel.add_actor(top, "control", Periodic::new(3.0, horizon))?;
    kernel.add_actor(top, "logger", Periodic::new(6.0, horizon))?;
    let edf = kernel.set_director(top, EdfDirector::new("edf", config))?;

    let mut manager = Manager::new(kernel, top);
    manager.run()?;

    if let Some(director) = manager.kernel().director_as::<EdfDirector>(edf) {
        println!("\nCompletions: {}", director.completions());
        println!("Deadline misses: {}", director.deadline_misses());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    println!("=== Nestor Mixed-Signal Example ===\n");
    run_tank()?;
    run_tasks()?;
    println!("\n=== Example Complete ===");
    Ok(())
}
