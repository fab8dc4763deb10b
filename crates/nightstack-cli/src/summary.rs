use console::Style;
use nightstack_core::discovery::TargetInventory;
use nightstack_core::error::NightstackError;
use nightstack_core::naming::normalize_target_name;
use nightstack_core::pipeline::config::PipelineConfig;
use nightstack_core::pipeline::{PipelinePlan, PipelineReport};
use nightstack_core::stage::StageOutcome;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            error: Style::new().red().bold(),
        }
    }
}

fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

pub fn print_pipeline_summary(config: &PipelineConfig, engine_name: &str) {
    let s = Styles::new();
    let paths = &config.paths;

    println!();
    println!("  {}", s.title.apply_to("Nightstack Pipeline"));
    println!("  {}", s.title.apply_to(rule(19)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Target"),
        s.value.apply_to(&config.target)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Repository"),
        s.path.apply_to(paths.repo.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Work"),
        s.path.apply_to(paths.work.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Engine"),
        s.method.apply_to(engine_name)
    );
    match config.calibration.bias_date {
        Some(ref date) => println!(
            "  {:<14}{}",
            s.label.apply_to("Bias date"),
            s.value.apply_to(date)
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Bias date"),
            s.disabled.apply_to("latest")
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Lights"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Background"),
        s.value.apply_to(format!("degree {}", config.lights.background_degree))
    );
    match config.lights.extraction {
        Some(ref extraction) if extraction.configs.is_empty() => println!(
            "    {:<12}{}",
            s.label.apply_to("Extract"),
            s.method.apply_to("Ha/OIII from every config")
        ),
        Some(ref extraction) => println!(
            "    {:<12}{}",
            s.label.apply_to("Extract"),
            s.method
                .apply_to(format!("Ha/OIII from {}", extraction.configs.join(", ")))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Extract"),
            s.disabled.apply_to("disabled")
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Channels"));
    for channel in &config.channels {
        let marker = if channel.name.eq_ignore_ascii_case(&config.renormalize.reference) {
            " (reference)"
        } else {
            ""
        };
        println!(
            "    {}{}",
            s.value.apply_to(channel),
            s.label.apply_to(marker)
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Stacking"),
        s.method.apply_to(format!(
            "{} {}",
            config.stacking.params.rejection, config.stacking.params.normalization
        ))
    );
    println!();
}

pub fn print_report(report: &PipelineReport) {
    let s = Styles::new();

    println!();
    println!(
        "  {} built, {} reused",
        s.value.apply_to(report.built_count()),
        s.label.apply_to(report.cached_count())
    );
    println!();
    println!(
        "  {}",
        s.header
            .apply_to(format!("Deliverables ({})", normalize_target_name(&report.target)))
    );
    for path in report.deliverables() {
        println!("    {}", s.path.apply_to(path.display()));
    }
    println!();
}

pub fn print_plan(plan: &PipelinePlan, with_outputs: bool) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(format!("Plan for {}", plan.target)));
    println!("  {}", s.title.apply_to(rule(9 + plan.target.chars().count())));
    println!();

    for stage in &plan.stages {
        let status = if stage.cached {
            s.disabled.apply_to(StageOutcome::Cached.to_string())
        } else {
            s.method.apply_to("build".to_string())
        };
        println!("    {:<8}{}", status, s.value.apply_to(&stage.label));
        if with_outputs {
            for path in &stage.outputs {
                println!("            {}", s.path.apply_to(path.display()));
            }
        }
    }
    println!();

    let pending = plan.pending().count();
    if pending == 0 {
        println!("  {}", s.label.apply_to("Everything is up to date."));
    } else {
        println!(
            "  {} of {} stages would run",
            s.value.apply_to(pending),
            plan.stages.len()
        );
    }
    println!();
}

pub fn print_inventory(inv: &TargetInventory) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(&inv.target));
    println!("  {}", s.title.apply_to(rule(inv.target.chars().count())));
    println!();

    if inv.sessions.is_empty() {
        println!("  {}", s.disabled.apply_to("no sessions found"));
        println!();
        return;
    }

    for session in &inv.sessions {
        println!("  {}", s.header.apply_to(&session.session));
        if session.configs.is_empty() {
            println!("    {}", s.disabled.apply_to("no flats"));
        }
        for c in &session.configs {
            println!(
                "    {:<12}{} flats, {} lights, {}",
                s.label.apply_to(&c.config),
                s.value.apply_to(c.flats),
                s.value.apply_to(c.lights),
                s.method.apply_to(format_hours(c.light_integration_secs))
            );
        }
    }
    println!();
    println!(
        "  {:<14}{} lights, {}",
        s.label.apply_to("Total"),
        s.value.apply_to(inv.total_lights()),
        s.method.apply_to(format_hours(inv.total_integration_secs()))
    );
    println!();
}

/// Stage, attempted inputs and engine output of a failed run.
pub fn print_failure(err: &NightstackError) {
    let s = Styles::new();

    eprintln!();
    match err.stage() {
        Some(stage) => eprintln!("  {} {}", s.error.apply_to("Stage failed:"), stage),
        None => eprintln!("  {}", s.error.apply_to("Pipeline failed")),
    }

    if let NightstackError::EngineFailure {
        inputs, diagnostic, ..
    } = err
    {
        eprintln!("  {}", s.header.apply_to("Inputs"));
        for input in inputs {
            eprintln!("    {}", s.path.apply_to(input.display()));
        }
        if !diagnostic.is_empty() {
            eprintln!("  {}", s.header.apply_to("Engine output"));
            for line in diagnostic.lines() {
                eprintln!("    {line}");
            }
        }
    }
    eprintln!();
}

fn format_hours(secs: f64) -> String {
    format!("{:.1} h", secs / 3600.0)
}
