use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use rlerank::{
    convert::{encode_edges, read_edge_list},
    helpers::build_helper_arrays,
    info::GraphInfo,
    pagerank::{self, DeltaReference, PageRankConfig, Teleport},
    partition::split,
    rle::{read_graph_file, write_graph_file},
    types::NodeId,
    Error,
};
use std::{fs::File, io::BufReader, str::FromStr, time::Instant};

fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>, Error> {
    matches
        .value_of(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for --{}: {}", name, value)))
        })
        .transpose()
}

fn read_topic(path: &str) -> Result<Vec<NodeId>, Error> {
    std::fs::read_to_string(path)?
        .split_whitespace()
        .map(|id| {
            id.parse()
                .map_err(|_| Error::Config(format!("invalid topic node id: {}", id)))
        })
        .collect()
}

fn handle_encode(matches: &ArgMatches) -> Result<(), Error> {
    let edges = read_edge_list(BufReader::new(File::open(
        matches.value_of("EDGES").unwrap(),
    )?))?;
    let stream = encode_edges(edges)?;
    write_graph_file(matches.value_of("GRAPH").unwrap(), &stream)
}

fn handle_info(matches: &ArgMatches) -> Result<(), Error> {
    let stream = read_graph_file(
        matches.value_of("GRAPH").unwrap(),
        matches.is_present("in-memory"),
    )?;
    let helpers = build_helper_arrays(&stream)?;
    println!("{}", GraphInfo::new(&stream, &helpers));
    Ok(())
}

fn handle_rank(matches: &ArgMatches) -> Result<(), Error> {
    let stream = read_graph_file(
        matches.value_of("GRAPH").unwrap(),
        matches.is_present("in-memory"),
    )?;
    let helpers = build_helper_arrays(&stream)?;
    let mut config = PageRankConfig::new();
    config
        .num_threads(parse_arg(matches, "threads")?)
        .max_iterations(parse_arg(matches, "max-iterations")?);
    if let Some(damping_factor) = parse_arg(matches, "damping")? {
        config.damping_factor(damping_factor);
    }
    if let Some(threshold) = parse_arg(matches, "threshold")? {
        config.threshold(threshold);
    }
    if let Some(name) = matches.value_of("delta-reference") {
        config.delta_reference(DeltaReference::new(name)?);
    }
    if let Some(path) = matches.value_of("topic") {
        config.teleport(Teleport::Topic(read_topic(path)?));
    }
    let num_partitions =
        parse_arg(matches, "partitions")?.unwrap_or_else(|| config.thread_count());
    let partitions = split(&stream, num_partitions)?;
    let ranks = pagerank::run(&stream, &helpers, &partitions, &config)?;
    pagerank::write_ranks_file(
        matches.value_of("OUTPUT").unwrap(),
        ranks.as_slice(),
        &helpers,
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let in_memory = Arg::with_name("in-memory")
        .long("in-memory")
        .help("Reads the graph file into memory instead of mapping it");
    let matches = App::new("rlerank")
        .about("Parallel PageRank over run-length encoded link graphs")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("encode")
                .about("Encodes a text edge list of `<source> <destination>` lines")
                .arg(Arg::with_name("EDGES").required(true))
                .arg(Arg::with_name("GRAPH").required(true)),
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Displays a summary of a graph file")
                .arg(Arg::with_name("GRAPH").required(true))
                .arg(in_memory.clone()),
        )
        .subcommand(
            SubCommand::with_name("rank")
                .about("Computes PageRank and writes `<node> <rank>` lines")
                .arg(Arg::with_name("GRAPH").required(true))
                .arg(Arg::with_name("OUTPUT").required(true))
                .arg(in_memory)
                .arg(
                    Arg::with_name("threads")
                        .long("threads")
                        .takes_value(true)
                        .help("Number of worker threads [default: number of CPUs]"),
                )
                .arg(
                    Arg::with_name("partitions")
                        .long("partitions")
                        .takes_value(true)
                        .help("Number of partitions [default: number of threads]"),
                )
                .arg(
                    Arg::with_name("damping")
                        .long("damping")
                        .takes_value(true)
                        .help("Damping factor [default: 0.85]"),
                )
                .arg(
                    Arg::with_name("threshold")
                        .long("threshold")
                        .takes_value(true)
                        .help("Stops once the delta drops below this value [default: 1]"),
                )
                .arg(
                    Arg::with_name("delta-reference")
                        .long("delta-reference")
                        .takes_value(true)
                        .possible_values(&["snapshot", "normalized"])
                        .help("Ranks the delta is measured against [default: snapshot]"),
                )
                .arg(
                    Arg::with_name("max-iterations")
                        .long("max-iterations")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("topic")
                        .long("topic")
                        .takes_value(true)
                        .help("File of node ids the random surfer restarts from"),
                ),
        )
        .get_matches();
    let time_start = Instant::now();
    if let Some(matches) = matches.subcommand_matches("encode") {
        handle_encode(matches)?;
    } else if let Some(matches) = matches.subcommand_matches("info") {
        handle_info(matches)?;
    } else if let Some(matches) = matches.subcommand_matches("rank") {
        handle_rank(matches)?;
    }
    log::info!("total_time: {}ms", time_start.elapsed().as_millis());
    Ok(())
}
