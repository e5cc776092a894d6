use objtree::logging::{self, debug, error, info, warn};
use objtree::{Object, ObjectId, RootOptions, RuntimeConfig, VarKind};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
}

impl Args {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let prog = args.first().map(String::as_str).unwrap_or("objtree");

        let mut config = None;
        let mut rest = args.iter().skip(1);
        while let Some(arg) = rest.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(Self::usage(prog)),
                "--config" | "-c" => match rest.next() {
                    Some(path) => config = Some(PathBuf::from(path)),
                    None => return Err(format!("--config needs a file\n\n{}", Self::usage(prog))),
                },
                opt => return Err(format!("Unknown option: {}\n\n{}", opt, Self::usage(prog))),
            }
        }

        Ok(Self { config })
    }

    fn usage(prog: &str) -> String {
        format!(
            "objtree - object tree control surface\n\n\
            USAGE:\n    {} [OPTIONS]\n\n\
            OPTIONS:\n    \
            -h, --help           Print help information\n    \
            -c, --config FILE    Load runtime configuration from a TOML file\n\n\
            COMMANDS (stdin):\n    \
            new <parent-id|root> <type>\n    \
            release <id>\n    \
            set <id> <var> <int>\n    \
            tree\n    \
            vars [id]\n    \
            quit",
            prog
        )
    }
}

/// Objects created from the prompt, each holding one reference
struct Session {
    root: Object,
    handles: BTreeMap<ObjectId, Object>,
    type_names: HashSet<&'static str>,
}

impl Session {
    fn new(root: Object) -> Self {
        Self {
            root,
            handles: BTreeMap::new(),
            type_names: HashSet::new(),
        }
    }

    /// Type names live as long as the process
    fn intern(&mut self, name: &str) -> &'static str {
        if let Some(known) = self.type_names.get(name) {
            return *known;
        }
        let leaked: &'static str = Box::leak(name.to_string().into_boxed_str());
        self.type_names.insert(leaked);
        leaked
    }

    fn lookup(&self, arg: &str) -> Result<Object, String> {
        if arg == "root" {
            return Ok(self.root.clone());
        }
        let id: ObjectId = arg.parse().map_err(|e| format!("{}: {}", arg, e))?;
        objtree::exists(&self.root, id).ok_or_else(|| format!("no such object: {}", arg))
    }

    fn execute(&mut self, line: &str) -> Result<bool, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => return Ok(false),
            ["new", parent, type_name] => {
                let parent = self.lookup(parent)?;
                let type_name = self.intern(type_name);
                let obj = Object::create(Some(&parent), 0, type_name).map_err(|e| e.to_string())?;
                println!("{}", obj.id());
                self.handles.insert(obj.id(), obj);
            }
            ["release", id] => {
                let id: ObjectId = id.parse().map_err(|e| format!("{}: {}", id, e))?;
                match self.handles.remove(&id) {
                    Some(obj) => obj.release(),
                    None => return Err(format!("not holding {}", id)),
                }
            }
            ["set", target, name, value] => {
                let obj = self.lookup(target)?;
                let value: i64 = value.parse().map_err(|e| format!("{}: {}", value, e))?;
                if !obj.var_exists(name) {
                    obj.var_create(name, VarKind::Integer).map_err(|e| e.to_string())?;
                }
                obj.var_set(name, value).map_err(|e| e.to_string())?;
            }
            ["tree"] => self.root.var_command("tree", "").map_err(|e| e.to_string())?,
            ["vars"] => self.root.var_command("vars", "").map_err(|e| e.to_string())?,
            ["vars", id] => self.root.var_command("vars", id).map_err(|e| e.to_string())?,
            _ => return Err(format!("unknown command: {}", line.trim())),
        }
        Ok(true)
    }

    /// Release handles newest first so children go before their parents
    fn shutdown(mut self) {
        while let Some((_, obj)) = self.handles.pop_last() {
            obj.release();
        }
    }
}

fn load_config(args: &Args) -> Result<RuntimeConfig, String> {
    let config = match &args.config {
        Some(path) => RuntimeConfig::from_file(path).map_err(|e| e.to_string())?,
        None => RuntimeConfig::default(),
    };
    Ok(config.apply_env())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let _guard = objtree::init(&config);
    debug!(config = ?args.config, logging = logging::is_initialized(), "Configuration loaded");

    let root = Object::create_root(0, "root", RootOptions::default().with_config(config))?;
    info!(root = %root.id(), "objtree ready");

    let mut session = Session::new(root);
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match session.execute(&line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(command = line.trim(), error = %e, "Command failed");
                eprintln!("error: {}", e);
            }
        }
    }

    let held = session.handles.len();
    if held > 0 {
        debug!(held, "Releasing remaining objects");
    }
    session.shutdown();

    if objtree::tree::registered_count() > 0 {
        error!(
            registered = objtree::tree::registered_count(),
            "Objects still alive at exit"
        );
    }
    Ok(())
}
