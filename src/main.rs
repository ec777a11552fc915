use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use opportunity_filter::email::load_messages;
use opportunity_filter::{Config, Email, FilterAnalytics, FilterOutcome, RuleSet};
use serde::Serialize;
use std::process;

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    message_id: &'a str,
    from: &'a str,
    subject: &'a str,
    outcome: &'a FilterOutcome,
}

fn main() {
    let matches = Command::new("opportunity-filter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classify recruiting email as job opportunities or noise")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (YAML)"),
        )
        .arg(
            Arg::new("rules")
                .short('r')
                .long("rules")
                .value_name("FILE")
                .help("Rule override file (YAML or JSON); overrides rules_file from the config"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Messages to classify (JSON envelope, JSON array or JSONL)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write per-message outcomes as JSON"),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Print a filter analytics report")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("analytics")
                .long("analytics")
                .value_name("FILE")
                .help("Write the analytics summary as JSON"),
        )
        .arg(
            Arg::new("all-filters")
                .long("all-filters")
                .help("Run every filter even after a rejection")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-rules")
                .long("generate-rules")
                .value_name("FILE")
                .help("Write the built-in rule set to FILE and exit"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit"),
        )
        .arg(
            Arg::new("test-rules")
                .long("test-rules")
                .help("Load and compile the rule set, then exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log every filter decision")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-rules") {
        match RuleSet::default().to_file(path) {
            Ok(()) => println!("Default rules written to {}", path),
            Err(e) => fail(&format!("Error writing rules: {e:#}")),
        }
        return;
    }

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match Config::default().to_file(path) {
            Ok(()) => println!("Default configuration written to {}", path),
            Err(e) => fail(&format!("Error writing configuration: {e:#}")),
        }
        return;
    }

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => fail(&format!("Error loading configuration: {e:#}")),
        },
        None => Config::default(),
    };

    if let Some(rules) = matches.get_one::<String>("rules") {
        config.rules_file = Some(rules.clone());
    }
    if matches.get_flag("all-filters") {
        config.stop_on_reject = false;
    }

    // A bad rule file must stop the run before any email is classified
    let rules = match config.load_rules() {
        Ok(rules) => rules,
        Err(e) => fail(&format!("Error loading rules: {e:#}")),
    };

    if matches.get_flag("test-rules") {
        test_rules(&rules);
        return;
    }

    let Some(input) = matches.get_one::<String>("input") else {
        fail("No input given; pass --input FILE (see --help)");
    };

    let pipeline = match config.build_pipeline(&rules) {
        Ok(pipeline) => pipeline,
        Err(e) => fail(&format!("Error building filter pipeline: {e:#}")),
    };

    let emails = match load_messages(input) {
        Ok(emails) => emails,
        Err(e) => fail(&format!("Error loading messages: {e:#}")),
    };
    log::info!("Loaded {} messages from {}", emails.len(), input);

    let mut analytics = FilterAnalytics::new();
    analytics.start();
    let outcomes = pipeline.run(&emails);
    analytics.finish();

    if let Some(path) = matches.get_one::<String>("output") {
        if let Err(e) = write_outcomes(path, &emails, &outcomes) {
            fail(&format!("Error writing outcomes: {e:#}"));
        }
        log::info!("Outcomes written to {}", path);
    } else {
        print_outcomes(&emails, &outcomes);
    }

    let report = matches.get_flag("report");
    let analytics_path = matches.get_one::<String>("analytics");
    if report || analytics_path.is_some() {
        analytics.record_all(&emails, &outcomes);

        if report {
            println!();
            print!("{}", analytics.render_report());
        }
        if let Some(path) = analytics_path {
            let written = serde_json::to_string_pretty(&analytics.summary())
                .map_err(anyhow::Error::from)
                .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
            if let Err(e) = written {
                fail(&format!("Error writing analytics: {e:#}"));
            }
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn test_rules(rules: &RuleSet) {
    println!("Testing filter rules...");
    match rules.compile() {
        Ok(_) => {
            println!("✅ All patterns compile");
            for (name, size) in rules.category_sizes() {
                println!("  {:<32} {:>4}", name, size);
            }
        }
        Err(e) => fail(&format!("❌ Invalid rules: {e:#}")),
    }
}

fn print_outcomes(emails: &[Email], outcomes: &[FilterOutcome]) {
    for (email, outcome) in emails.iter().zip(outcomes) {
        let verdict = if outcome.passed { "KEEP" } else { "DROP" };
        let score = outcome
            .score()
            .map(|s| format!("{:>6.1}", s))
            .unwrap_or_else(|| "     -".to_string());
        println!("{} {} {:<40} {}", verdict, score, truncate(&email.from, 40), email.subject);
        if log::log_enabled!(log::Level::Debug) {
            for reason in &outcome.reasons {
                println!("         - {}", reason);
            }
        }
    }
}

fn write_outcomes(path: &str, emails: &[Email], outcomes: &[FilterOutcome]) -> anyhow::Result<()> {
    let records: Vec<OutcomeRecord> = emails
        .iter()
        .zip(outcomes)
        .map(|(email, outcome)| OutcomeRecord {
            message_id: &email.message_id,
            from: &email.from,
            subject: &email.subject,
            outcome,
        })
        .collect();
    std::fs::write(path, serde_json::to_string_pretty(&records)?)?;
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
