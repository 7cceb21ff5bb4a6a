//! The `clap` argument definition for every verb. Parsing only; verb bodies
//! live in `main.rs`.

use clap::{App, Arg, ArgMatches, SubCommand};

pub fn build_app() -> App<'static, 'static> {
    App::new("drydock")
        .about("Kubernetes resources and services management tool")
        .arg(Arg::with_name("namespace").short("n").long("namespace").takes_value(true).global(true).help("set kubernetes namespace"))
        .arg(Arg::with_name("context").short("c").long("context").takes_value(true).global(true).help("set kubernetes context"))
        .arg(Arg::with_name("kubeconfig").long("kubeconfig").takes_value(true).global(true).help("set kubectl config file"))
        .arg(
            Arg::with_name("variable")
                .long("variable")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .global(true)
                .help("variables to pass to the project file, e.g. --variable key1=value1"),
        )
        .arg(Arg::with_name("yes").short("y").long("yes").takes_value(false).global(true).help("run the command immediately, skipping confirmation"))
        .arg(
            Arg::with_name("include")
                .long("include")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .global(true)
                .help("include file patterns, e.g. --include=**/service.yml"),
        )
        .arg(
            Arg::with_name("exclude")
                .long("exclude")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .global(true)
                .help("exclude file patterns, e.g. --exclude=**/secret.yml"),
        )
        .subcommand(
            SubCommand::with_name("up")
                .about("Create all resources defined in a project file")
                .arg(Arg::with_name("project_file").required(true)),
        )
        .subcommand(
            SubCommand::with_name("down")
                .about("Destroy all resources defined in a project file")
                .arg(Arg::with_name("project_file").required(true))
                .arg(Arg::with_name("ns").long("ns").takes_value(false).help("also remove the namespace"))
                .arg(Arg::with_name("pvc").long("pvc").takes_value(false).help("also remove PersistentVolumeClaims")),
        )
        .subcommand(
            SubCommand::with_name("update")
                .about("Update resources declared in a project file, except pod and job")
                .arg(Arg::with_name("project_file").required(true)),
        )
        .subcommand(
            SubCommand::with_name("upgrade")
                .about("Upgrade all declared resources, including pod and job")
                .arg(Arg::with_name("project_file").required(true)),
        )
        .subcommand(
            SubCommand::with_name("restart")
                .about("Restart all pods associated with a service in the project")
                .arg(Arg::with_name("project_file").required(true)),
        )
        .subcommand(
            SubCommand::with_name("debug")
                .about("Print all resource descriptions resolved from a project file")
                .arg(Arg::with_name("project_file").required(true))
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .default_value("console")
                        .help("print format: console|yaml|tree|config"),
                )
                .arg(Arg::with_name("filter-group").long("filter-group").takes_value(true).help("only print matching resource groups"))
                .arg(Arg::with_name("exact").long("exact").takes_value(false).help("filter group by exact match"))
                .arg(Arg::with_name("print-resource").long("print-resource").takes_value(false).help("print resources in tree format")),
        )
        .subcommand(
            SubCommand::with_name("logs")
                .about("Print the log of a container in a pod")
                .arg(Arg::with_name("name").required(true))
                .arg(Arg::with_name("container").long("container").takes_value(true).help("print log from this container"))
                .arg(Arg::with_name("timeout").short("t").long("timeout").takes_value(true).help("timeout in seconds, <= 0 for infinity")),
        )
        .subcommand(
            SubCommand::with_name("wait")
                .about("Wait for a pod or a job to complete")
                .arg(Arg::with_name("kind").required(true).possible_values(&["pod", "job"]))
                .arg(Arg::with_name("name").required(true))
                .arg(
                    Arg::with_name("timeout")
                        .short("t")
                        .long("timeout")
                        .takes_value(true)
                        .default_value("300")
                        .help("timeout in seconds, <= 0 for infinity"),
                ),
        )
        .subcommand(
            SubCommand::with_name("generate")
                .about("Generate a project file skeleton")
                .arg(Arg::with_name("filename").required(true)),
        )
}

/// Parses `--variable key=value` into a map, exiting with code 2 on the
/// first malformed entry -- matches the teacher's `PersistentPreRun` check.
pub fn parse_variables(matches: &ArgMatches) -> drydock_core::Variables {
    let mut vars = drydock_core::Variables::new();
    if let Some(values) = matches.values_of("variable") {
        for raw in values {
            match raw.splitn(2, '=').collect::<Vec<_>>().as_slice() {
                [key, value] => {
                    vars.insert((*key).to_string(), (*value).to_string());
                }
                _ => {
                    eprintln!("Invalid variable: {}", raw);
                    std::process::exit(2);
                }
            }
        }
    }
    vars
}

pub fn string_list(matches: &ArgMatches, name: &str) -> Vec<String> {
    matches.values_of(name).map(|v| v.map(str::to_string).collect()).unwrap_or_default()
}
