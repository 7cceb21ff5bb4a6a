use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::ArgMatches;
use drydock::cli;
use drydock::controllers::resource as resource_controller;
use drydock::filters::build_group_filter;
use drydock::formatters::{ConfigFormatter, ConsoleFormatter, Formatter, TreeFormatter, YamlFormatter};
use drydock::orchestrator::Orchestrator;
use drydock_core::project::{self, Config};
use drydock_core::Variables;

fn main() {
    openssl_probe::init_ssl_cert_env_vars();
    loggerv::init_quiet().ok();

    let app = cli::build_app();
    let matches = app.get_matches();

    if let Err(e) = dispatch(&matches) {
        if debug_enabled() {
            eprintln!("{}", e.backtrace());
        }
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn debug_enabled() -> bool {
    std::env::var("DEBUG").map(|v| v == "1" || v == "true").unwrap_or(false)
}

/// Pulls a value for a flag declared `global(true)`: clap only copies
/// globals into whichever `ArgMatches` the user actually typed them before,
/// so check both the root and the subcommand matches.
fn global_value<'a>(root: &'a ArgMatches, sub: &'a ArgMatches, name: &str) -> Option<&'a str> {
    sub.value_of(name).or_else(|| root.value_of(name))
}

fn global_values(root: &ArgMatches, sub: &ArgMatches, name: &str) -> Vec<String> {
    let mut v = cli::string_list(sub, name);
    if v.is_empty() {
        v = cli::string_list(root, name);
    }
    v
}

fn global_variables(root: &ArgMatches, sub: &ArgMatches) -> Variables {
    let mut vars = cli::parse_variables(sub);
    for (k, v) in cli::parse_variables(root) {
        vars.entry(k).or_insert(v);
    }
    vars
}

fn dispatch(matches: &ArgMatches) -> drydock_core::Result<()> {
    match matches.subcommand() {
        ("up", Some(sub)) => cmd_up(matches, sub),
        ("down", Some(sub)) => cmd_down(matches, sub),
        ("update", Some(sub)) => cmd_update(matches, sub),
        ("upgrade", Some(sub)) => cmd_upgrade(matches, sub),
        ("restart", Some(sub)) => cmd_restart(matches, sub),
        ("debug", Some(sub)) => cmd_debug(matches, sub),
        ("logs", Some(sub)) => cmd_logs(matches, sub),
        ("wait", Some(sub)) => cmd_wait(matches, sub),
        ("generate", Some(sub)) => cmd_generate(sub),
        _ => {
            eprintln!("no subcommand given, see --help");
            process::exit(2);
        }
    }
}

fn build_orchestrator(root: &ArgMatches, sub: &ArgMatches, project_file_arg: &str) -> drydock_core::Result<Orchestrator> {
    let project_file = Path::new(sub.value_of(project_file_arg).unwrap());
    let namespace = global_value(root, sub, "namespace").unwrap_or("");
    let context = global_value(root, sub, "context").unwrap_or("");
    let kube_config = global_value(root, sub, "kubeconfig").unwrap_or("");
    let variables = global_variables(root, sub);
    let include = global_values(root, sub, "include");
    let exclude = global_values(root, sub, "exclude");
    let project = project::read_project(project_file, namespace, context, kube_config, &variables, &include, &exclude)?;
    Orchestrator::new(project)
}

fn confirm(root: &ArgMatches, sub: &ArgMatches, prompt: &str) -> drydock_core::Result<bool> {
    if root.is_present("yes") || sub.is_present("yes") {
        return Ok(true);
    }
    print!("{} (yes/no): ", prompt);
    io::stdout().flush().ok();
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

fn cmd_up(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let orchestrator = build_orchestrator(root, sub, "project_file")?;
    if !confirm(root, sub, "Create all resources?")? {
        return Ok(());
    }
    orchestrator.up()
}

fn cmd_down(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let orchestrator = build_orchestrator(root, sub, "project_file")?;
    if !confirm(root, sub, "Destroy all resources?")? {
        return Ok(());
    }
    orchestrator.down(sub.is_present("ns"), sub.is_present("pvc"))
}

fn cmd_update(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let orchestrator = build_orchestrator(root, sub, "project_file")?;
    if !confirm(root, sub, "Update all resources?")? {
        return Ok(());
    }
    orchestrator.update()
}

fn cmd_upgrade(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let orchestrator = build_orchestrator(root, sub, "project_file")?;
    if !confirm(root, sub, "Upgrade all resources?")? {
        return Ok(());
    }
    orchestrator.upgrade()
}

fn cmd_restart(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let orchestrator = build_orchestrator(root, sub, "project_file")?;
    let pods = orchestrator.get_service_pods()?;
    println!("Pods to restart: {}", pods.iter().cloned().collect::<Vec<_>>().join(", "));
    if !confirm(root, sub, "Restart all pods?")? {
        return Ok(());
    }
    orchestrator.restart()
}

fn cmd_debug(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let mut orchestrator = build_orchestrator(root, sub, "project_file")?;
    let filter = build_group_filter(sub.value_of("filter-group").unwrap_or(""), sub.is_present("exact"))?;
    orchestrator.project.set_filter(filter);
    let formatter: Box<dyn Formatter> = match sub.value_of("output").unwrap_or("console").to_lowercase().as_str() {
        "console" => Box::new(ConsoleFormatter::new()),
        "yaml" => Box::new(YamlFormatter::new()),
        "tree" => Box::new(TreeFormatter::new(sub.is_present("print-resource"))),
        "config" => Box::new(ConfigFormatter::new()),
        other => {
            eprintln!("warning: unknown output formatter {:?}, falling back to console", other);
            Box::new(ConsoleFormatter::new())
        }
    };
    print!("{}", formatter.format(&orchestrator.project));
    Ok(())
}

/// `timeout_secs <= 0` means wait forever, matching the teacher's
/// `timeout <= 0` convention for `logs`/`wait`.
fn run_with_optional_timeout<F>(timeout_secs: i64, name: String, kind: String, task: F) -> drydock_core::Result<()>
where
    F: FnOnce() -> drydock_core::Result<()> + Send + 'static,
{
    if timeout_secs <= 0 {
        task()
    } else {
        drydock::walker::wait_gate(std::time::Duration::from_secs(timeout_secs as u64), name, kind, task)
    }
}

fn cmd_logs(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let namespace = global_value(root, sub, "namespace").unwrap_or("");
    let context = global_value(root, sub, "context").unwrap_or("");
    let kube_config = global_value(root, sub, "kubeconfig").unwrap_or("");
    let backend = drydock::backend::Backend::new(namespace, context, kube_config)?;
    let pod = sub.value_of("name").unwrap().to_string();
    let container = sub.value_of("container").map(str::to_string);
    let timeout: i64 = sub.value_of("timeout").and_then(|s| s.parse().ok()).unwrap_or(0);
    let pod_for_task = pod.clone();
    run_with_optional_timeout(timeout, pod, "pod".to_string(), move || {
        resource_controller::logs(&backend, &pod_for_task, container.as_deref())?;
        Ok(())
    })
}

fn cmd_wait(root: &ArgMatches, sub: &ArgMatches) -> drydock_core::Result<()> {
    let namespace = global_value(root, sub, "namespace").unwrap_or("");
    let context = global_value(root, sub, "context").unwrap_or("");
    let kube_config = global_value(root, sub, "kubeconfig").unwrap_or("");
    let backend = drydock::backend::Backend::new(namespace, context, kube_config)?;
    let kind = sub.value_of("kind").unwrap().to_string();
    let name = sub.value_of("name").unwrap().to_string();
    let timeout: i64 = sub.value_of("timeout").and_then(|s| s.parse().ok()).unwrap_or(300);
    let (kind_for_task, name_for_task) = (kind.clone(), name.clone());
    run_with_optional_timeout(timeout, name, kind, move || {
        use drydock::controllers::resource::WaitOutcome;
        match resource_controller::wait(&backend, &kind_for_task, &name_for_task)? {
            WaitOutcome::Succeeded => Ok(()),
            WaitOutcome::Failed | WaitOutcome::NotExist => {
                Err(drydock::walker::WalkerError::wait_failed(name_for_task, kind_for_task).into())
            }
        }
    })
}

fn cmd_generate(sub: &ArgMatches) -> drydock_core::Result<()> {
    let filename = sub.value_of("filename").unwrap();
    let config = Config::skeleton("your_namespace");
    let mut file = std::fs::File::create(filename)?;
    config.write_skeleton(&mut file)
}
