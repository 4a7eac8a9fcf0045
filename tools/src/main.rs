//! billing-runner: headless runner for the GridBill engine.
//!
//! Usage:
//!   billing-runner --seed 12345 --days 180 --consumers 25 --db run.db
//!   billing-runner --db billing.db --ipc-mode     (JSON lines on stdin/stdout)
//!   billing-runner --db billing.db --ipc-mode --now 2024-02-01T09:00:00Z

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use gridbill_core::{
    clock::{Clock, FixedClock, SystemClock},
    config::BillingConfig,
    consumer::{ConsumerProfile, PaymentStatus, ProfileUpdate},
    cycle::CycleWindows,
    engine::BillingEngine,
    error::BillingError,
    reading::ReadingSubmission,
    simulation::{BillingSimulation, SimulationParams},
    store::BillingStore,
    summary::calculate_bill_details,
};
use serde::Serialize;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Register {
        profile: ConsumerProfile,
        tariff_plan: String,
        #[serde(default)]
        initial_reading: f64,
        at: Option<DateTime<Utc>>,
    },
    GetConsumer {
        consumer_number: String,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    ListConsumers,
    UpdateProfile {
        consumer_number: String,
        update: ProfileUpdate,
    },
    DeleteConsumer {
        consumer_number: String,
    },
    MeterDetails {
        consumer_number: String,
    },
    SubmitReading {
        consumer_number: String,
        submission: ReadingSubmission,
        at: Option<DateTime<Utc>>,
    },
    BillSummary {
        consumer_number: String,
        at: Option<DateTime<Utc>>,
    },
    EvaluateConsumer {
        consumer_number: String,
        at: Option<DateTime<Utc>>,
    },
    MarkPaid {
        consumer_number: String,
        at: Option<DateTime<Utc>>,
    },
    SweepFines {
        at: Option<DateTime<Utc>>,
    },
    MissedReadings {
        at: Option<DateTime<Utc>>,
    },
    DispatchReminders {
        at: Option<DateTime<Utc>>,
    },
    CalculateBill {
        bill_amount: f64,
        deadline: DateTime<Utc>,
        at: Option<DateTime<Utc>>,
    },
    ResolveCycle {
        date: NaiveDate,
    },
    Events {
        consumer_number: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let days = parse_arg(&args, "--days", 180u64);
    let consumers = parse_arg(&args, "--consumers", 25usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let start = string_arg(&args, "--start")
        .map(|s| s.parse::<NaiveDate>())
        .transpose()?
        .unwrap_or_else(gridbill_core::cycle::default_epoch);
    let fixed_now = string_arg(&args, "--now")
        .map(|s| s.parse::<DateTime<Utc>>())
        .transpose()?;

    let config = BillingConfig::load(data_dir)?;
    let store = BillingStore::open(db)?;
    store.migrate()?;
    let engine = BillingEngine::new(config, store);

    if ipc_mode {
        return match fixed_now {
            Some(at) => run_ipc_loop(engine, &FixedClock(at)),
            None => run_ipc_loop(engine, &SystemClock),
        };
    }

    println!("GridBill billing-runner");
    println!("  seed:       {seed}");
    println!("  epoch:      {}", engine.config.calendar.epoch());
    println!("  start:      {start}");
    println!("  days:       {days}");
    println!("  consumers:  {consumers}");
    println!("  db:         {db}");
    println!("  data_dir:   {data_dir}");
    println!();

    let params = SimulationParams { consumers, ..SimulationParams::default() };
    let mut sim = BillingSimulation::new(engine, seed, start, params)?;
    sim.run_days(days)?;
    print_summary(&sim)?;
    Ok(())
}

fn run_ipc_loop(mut engine: BillingEngine, clock: &dyn Clock) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string(), "kind": "bad_request" });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(&mut engine, clock, cmd) {
            Ok(value) => serde_json::json!({ "ok": value }),
            Err(e) if e.is_rejection() => serde_json::json!({
                "error": e.to_string(),
                "kind": e.kind(),
            }),
            Err(e) => {
                log::warn!("ipc: infrastructure failure: {e}");
                serde_json::json!({ "error": e.to_string(), "kind": e.kind() })
            }
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(
    engine: &mut BillingEngine,
    clock: &dyn Clock,
    cmd: IpcCommand,
) -> Result<serde_json::Value, BillingError> {
    let now = |at: Option<DateTime<Utc>>| at.unwrap_or_else(|| clock.now());

    match cmd {
        IpcCommand::Register { profile, tariff_plan, initial_reading, at } => {
            to_json(&engine.register_consumer(profile, &tariff_plan, initial_reading, now(at))?)
        }
        IpcCommand::GetConsumer { consumer_number, at } => {
            to_json(&engine.load_consumer(&consumer_number, now(at))?)
        }
        IpcCommand::ListConsumers => to_json(&engine.all_consumers()?),
        IpcCommand::UpdateProfile { consumer_number, update } => {
            to_json(&engine.update_profile(&consumer_number, update)?)
        }
        IpcCommand::DeleteConsumer { consumer_number } => {
            engine.delete_consumer(&consumer_number)?;
            Ok(serde_json::json!({ "deleted": consumer_number }))
        }
        IpcCommand::MeterDetails { consumer_number } => to_json(&engine.meter_details(&consumer_number)?),
        IpcCommand::SubmitReading { consumer_number, submission, at } => {
            to_json(&engine.submit_reading(&consumer_number, &submission, now(at))?)
        }
        IpcCommand::BillSummary { consumer_number, at } => {
            to_json(&engine.bill_summary(&consumer_number, now(at))?)
        }
        IpcCommand::EvaluateConsumer { consumer_number, at } => {
            to_json(&engine.evaluate_consumer(&consumer_number, now(at))?)
        }
        IpcCommand::MarkPaid { consumer_number, at } => to_json(&engine.mark_paid(&consumer_number, now(at))?),
        IpcCommand::SweepFines { at } => to_json(&engine.sweep_overdue_fines(now(at))?),
        IpcCommand::MissedReadings { at } => to_json(&engine.consumers_with_missed_readings(now(at))?),
        IpcCommand::DispatchReminders { at } => to_json(&engine.dispatch_reminders(now(at))?),
        IpcCommand::CalculateBill { bill_amount, deadline, at } => {
            to_json(&calculate_bill_details(bill_amount, deadline, now(at), &engine.config.fine)?)
        }
        IpcCommand::ResolveCycle { date } => {
            let windows: CycleWindows = engine.config.calendar.resolve(date);
            to_json(&windows)
        }
        IpcCommand::Events { consumer_number } => to_json(&engine.events_for_consumer(&consumer_number)?),
        IpcCommand::Quit => Ok(serde_json::Value::Null),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, BillingError> {
    Ok(serde_json::to_value(value)?)
}

fn print_summary(sim: &BillingSimulation) -> Result<()> {
    let store = &sim.engine.store;
    let stats = &sim.stats;

    println!("=== RUN SUMMARY ===");
    println!("  days run:          {}", stats.days_run);
    println!("  last day:          {}", sim.clock.today());
    println!("  consumers:         {}", store.consumer_count()?);
    println!("  readings accepted: {}", stats.readings_accepted);
    println!("  readings rejected: {}", stats.readings_rejected);
    println!("  payments:          {}", stats.payments);
    println!("  reminders issued:  {}", stats.reminders_issued);
    println!("  fines applied:     {}", stats.fines_applied);

    println!();
    println!("=== FINANCIAL SUMMARY ===");
    println!("  total billed:      {:.2}", stats.total_billed);
    println!("  total collected:   {:.2}", stats.total_collected);
    for status in [PaymentStatus::Paid, PaymentStatus::Pending, PaymentStatus::Overdue] {
        println!(
            "  {:<8}           {}",
            status.as_str(),
            store.consumer_count_by_status(status)?
        );
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
