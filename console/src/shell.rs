//! Line-oriented command interpreter
//!
//! One command per line: a name, an optional positional argument and any
//! number of `key=value` options (a bare `key=` or `key` after the argument
//! sets a flag). `#` starts a comment. Solver options registered with `set`
//! persist and are merged under the inline ones of `flowsolver_create`.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};

use flownet_core::algorithm::StatisticRow;
use flownet_core::{create_solver, FlowSolver, GeneratorOptions, Network, RandomSource, SolverMethod, Topology};

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandLine {
    pub name: String,
    pub argument: Option<String>,
    pub options: HashMap<String, String>,
}

impl CommandLine {
    /// Split a line into command, argument and options; `None` for blank
    /// and comment lines
    pub fn parse(line: &str) -> Option<Self> {
        let line = match line.find('#') {
            Some(at) => &line[..at],
            None => line,
        };
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?.to_string();

        let mut command = CommandLine {
            name,
            ..Self::default()
        };
        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) => {
                    command.options.insert(key.to_string(), value.to_string());
                }
                None if command.argument.is_none() => command.argument = Some(token.to_string()),
                None => {
                    command.options.insert(token.to_string(), String::new());
                }
            }
        }
        Some(command)
    }

    fn require_argument(&self) -> Result<&str> {
        self.argument
            .as_deref()
            .ok_or_else(|| anyhow!("'{}' requires an argument", self.name))
    }
}

/// Whether the interpreter keeps reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

const HELP: &str = "\
Network
  network_load <file>            read an edge list
  network_save <file>            write the current edge list
  network_generate [k=v ...]     layered random network (countNode, countLayer,
                                 deltaNodeLayer, countEdgeForNode, capacityEdge,
                                 entropy, seed)
  network_pruning                drop self-loops, sentinel back edges, opposite edges
  network_fullconnected          add missing reverse edges
  network_print                  summary and edge list
  network_close                  discard the network
Solver
  flowsolver_create <method> [k=v ...]
                                 0|immune, 1|ant_colony, 2|ford_fulkerson
  flowsolver_run                 solve
  flowsolver_reset               clear results, keep configuration
  flowsolver_dispose             discard the solver
  flowsolver_input               options and network summary
  flowsolver_output              best iteration
  flowsolver_best                best solution
  flowsolver_statistic <name>    write statistics to <name>.csv
Shell
  set <key>[=<value>]            persistent solver option
  unset <key>                    remove a persistent solver option
  clear                          remove all persistent solver options
  open <file>                    run a script
  print <text>                   echo
  help                           this text
  exit                           quit";

/// Interpreter state: the current network, solver and persistent options
pub struct Shell<W: Write> {
    output: W,
    network: Option<Network>,
    solver: Option<Box<dyn FlowSolver>>,
    options: BTreeMap<String, String>,
    random: RandomSource,
    workdir: PathBuf,
}

impl<W: Write> Shell<W> {
    pub fn new(output: W, random: RandomSource) -> Self {
        Self {
            output,
            network: None,
            solver: None,
            options: BTreeMap::new(),
            random,
            workdir: PathBuf::from("."),
        }
    }

    /// Run every line of a script, stopping at the first failure or `exit`
    pub fn run_script(&mut self, path: &Path) -> Result<Flow> {
        let path = self.resolve(path);
        let file = File::open(&path).with_context(|| format!("cannot open script {}", path.display()))?;
        info!("Running script {}", path.display());
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let flow = self
                .execute_line(&line)
                .with_context(|| format!("{}:{}: {}", path.display(), number + 1, line.trim()))?;
            if flow == Flow::Exit {
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Read commands interactively; failures are reported and skipped
    pub fn run_interactive<R: BufRead>(&mut self, input: R) -> Result<()> {
        write!(self.output, "> ")?;
        self.output.flush()?;
        for line in input.lines() {
            match self.execute_line(&line?) {
                Ok(Flow::Exit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => writeln!(self.output, "Error: {:#}", e)?,
            }
            write!(self.output, "> ")?;
            self.output.flush()?;
        }
        Ok(())
    }

    pub fn execute_line(&mut self, line: &str) -> Result<Flow> {
        match CommandLine::parse(line) {
            Some(command) => self.execute(&command),
            None => Ok(Flow::Continue),
        }
    }

    pub fn execute(&mut self, command: &CommandLine) -> Result<Flow> {
        match command.name.as_str() {
            "network_load" => self.network_load(command)?,
            "network_save" => self.network_save(command)?,
            "network_generate" => self.network_generate(command)?,
            "network_pruning" => {
                let removed = self.network_mut()?.pruning();
                writeln!(self.output, "Removed {} edges", removed)?;
            }
            "network_fullconnected" => {
                let network = self.network.as_mut().ok_or_else(|| anyhow!("no network loaded"))?;
                let added = network.fullconnected(&mut self.random);
                writeln!(self.output, "Added {} edges", added)?;
            }
            "network_print" => {
                let network = self.network.as_ref().ok_or_else(|| anyhow!("no network loaded"))?;
                writeln!(self.output, "{}", network)?;
                for (key, edge) in network.topology().iter() {
                    writeln!(self.output, "{} {}", key, edge)?;
                }
            }
            "network_close" => self.network = None,
            "flowsolver_create" => self.flowsolver_create(command)?,
            "flowsolver_run" => {
                let solver = self.solver_mut()?;
                solver.solve()?;
                let summary = match solver.best() {
                    Some(best) => format!("Best fitness {}", best.fitness),
                    None => "No valid result".to_string(),
                };
                let elapsed = solver.execution_time().unwrap_or_default();
                writeln!(self.output, "{} ({:.3} ms)", summary, elapsed.as_secs_f64() * 1000.0)?;
            }
            "flowsolver_reset" => self.solver_mut()?.reset(),
            "flowsolver_dispose" => {
                if let Some(mut solver) = self.solver.take() {
                    solver.dispose();
                }
            }
            "flowsolver_input" => {
                let text = self.solver_ref()?.describe_input();
                writeln!(self.output, "{}", text)?;
            }
            "flowsolver_output" => {
                let text = self.solver_ref()?.describe_output();
                writeln!(self.output, "{}", text)?;
            }
            "flowsolver_best" => {
                let text = match self.solver_ref()?.best_solution() {
                    Some(solution) => solution.to_string(),
                    None => "No result available".to_string(),
                };
                writeln!(self.output, "{}", text)?;
            }
            "flowsolver_statistic" => self.flowsolver_statistic(command)?,
            "set" => {
                if command.argument.is_none() && command.options.is_empty() {
                    bail!("'set' requires key[=value]");
                }
                if let Some(key) = &command.argument {
                    self.options.insert(key.clone(), String::new());
                }
                for (key, value) in &command.options {
                    self.options.insert(key.clone(), value.clone());
                }
            }
            "unset" => {
                self.options.remove(command.require_argument()?);
            }
            "clear" => self.options.clear(),
            "open" => {
                let path = PathBuf::from(command.require_argument()?);
                return self.run_script(&path);
            }
            "print" => {
                let text = line_text(command);
                writeln!(self.output, "{}", text)?;
            }
            "help" => writeln!(self.output, "{}", HELP)?,
            "exit" | "quit" => return Ok(Flow::Exit),
            other => bail!("unknown command '{}', try 'help'", other),
        }
        Ok(Flow::Continue)
    }

    /// Persistent options overlaid with the command's own
    fn merged_options(&self, command: &CommandLine) -> HashMap<String, String> {
        let mut merged: HashMap<String, String> = self.options.clone().into_iter().collect();
        merged.extend(command.options.clone());
        merged
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    fn network_mut(&mut self) -> Result<&mut Network> {
        self.network.as_mut().ok_or_else(|| anyhow!("no network loaded"))
    }

    fn solver_ref(&self) -> Result<&dyn FlowSolver> {
        self.solver.as_deref().ok_or_else(|| anyhow!("no solver created"))
    }

    fn solver_mut(&mut self) -> Result<&mut Box<dyn FlowSolver>> {
        self.solver.as_mut().ok_or_else(|| anyhow!("no solver created"))
    }

    fn network_load(&mut self, command: &CommandLine) -> Result<()> {
        let path = self.resolve(Path::new(command.require_argument()?));
        // A failed load leaves no network behind
        self.network = None;
        let topology = Topology::read(&path).with_context(|| format!("cannot load {}", path.display()))?;
        let network = Network::from_topology(&topology);
        writeln!(self.output, "{}", network)?;
        self.network = Some(network);
        Ok(())
    }

    fn network_save(&mut self, command: &CommandLine) -> Result<()> {
        let path = self.resolve(Path::new(command.require_argument()?));
        let network = self.network.as_ref().ok_or_else(|| anyhow!("no network loaded"))?;
        network
            .topology()
            .write(&path)
            .with_context(|| format!("cannot save {}", path.display()))?;
        writeln!(self.output, "Saved {}", path.display())?;
        Ok(())
    }

    fn network_generate(&mut self, command: &CommandLine) -> Result<()> {
        let options = GeneratorOptions::from_arguments(&command.options)?;
        let network = match options.seed {
            Some(seed) => Network::generate(&options, &mut RandomSource::new(seed))?,
            None => Network::generate(&options, &mut self.random)?,
        };
        writeln!(self.output, "{}", network)?;
        self.network = Some(network);
        Ok(())
    }

    fn flowsolver_create(&mut self, command: &CommandLine) -> Result<()> {
        let method: SolverMethod = command.require_argument()?.parse()?;
        let network = self.network.as_ref().ok_or_else(|| anyhow!("no network loaded"))?;

        let mut solver = create_solver(method);
        solver.set_topology(network.topology())?;
        let arguments = self.merged_options(command);
        solver.set_arguments(&arguments)?;
        if let Some(mut previous) = self.solver.replace(solver) {
            warn!("Replacing {} solver", previous.method());
            previous.dispose();
        }
        writeln!(self.output, "Created {} solver", method)?;
        Ok(())
    }

    fn flowsolver_statistic(&mut self, command: &CommandLine) -> Result<()> {
        let name = command.require_argument()?;
        let file_name = if name.ends_with(".csv") {
            name.to_string()
        } else {
            format!("{}.csv", name)
        };
        let path = self.resolve(Path::new(&file_name));
        let rows = StatisticRow::from_statistics(self.solver_ref()?.statistics());

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(&path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        writeln!(self.output, "Saved {} rows to {}", rows.len(), path.display())?;
        Ok(())
    }
}

/// Argument and options of a `print` command, rejoined
fn line_text(command: &CommandLine) -> String {
    let mut parts: Vec<String> = command.argument.iter().cloned().collect();
    let mut options: Vec<_> = command.options.iter().collect();
    options.sort();
    parts.extend(options.into_iter().map(|(k, v)| {
        if v.is_empty() {
            k.clone()
        } else {
            format!("{}={}", k, v)
        }
    }));
    parts.join(" ")
}

#[cfg(test)]
impl<W: Write> Shell<W> {
    /// Resolve relative paths against this directory
    fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    fn solver(&self) -> Option<&dyn FlowSolver> {
        self.solver.as_deref()
    }
}
