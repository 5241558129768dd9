//! Imports a Cisco terminal dump into a [PhysicalNode].
use std::path::Path;

use super::registry::{CommandRegistry, Lookup};
use super::splitter::{CommandSplitter, SplitterOptions};
use crate::error::ImportError;
use crate::import::topology::PhysicalNode;

pub struct CiscoReader<'r> {
    registry: &'r CommandRegistry,
    options: SplitterOptions,
}

impl<'r> CiscoReader<'r> {
    pub fn new(registry: &'r CommandRegistry) -> Self {
        Self::with_options(registry, SplitterOptions::default())
    }

    pub fn with_options(registry: &'r CommandRegistry, options: SplitterOptions) -> Self {
        Self { registry, options }
    }

    /// Splits `path` into command sections and runs each through its parser.
    ///
    /// Sections that cannot be read or parsed are logged and skipped. The dump must name the
    /// device in at least one prompt and contain at least one usable command.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<PhysicalNode, ImportError> {
        let path = path.as_ref();
        log::info!("Splitting {}", path.display());
        let splitter = CommandSplitter::split(path, &self.options)?;

        if splitter.device_name().is_empty() {
            return Err(ImportError::NoDeviceName(path.to_path_buf()));
        }
        if splitter.is_empty() {
            return Err(ImportError::NoCommands(path.to_path_buf()));
        }

        let mut node = PhysicalNode::new(splitter.device_name());
        node.source = Some(path.to_path_buf());

        for section in splitter.sections() {
            let command = section.command.as_str();
            match self.registry.lookup(command) {
                Lookup::Unsupported => log::warn!("Unsupported command, \"{command}\"."),
                Lookup::SubCommand { key } => log::warn!(
                    "Cannot process subcommand in {}. Found \"{command}\", expected \"{key}\".",
                    path.display()
                ),
                Lookup::Parser { key, parser } => {
                    let lines = match section.read_lines() {
                        Ok(lines) => lines,
                        Err(err) => {
                            log::error!("Cannot read section \"{command}\": {err}");
                            continue;
                        }
                    };
                    log::info!("Parsing \"{command}\" as {key}");
                    if parser.parse(&lines, &mut node) {
                        node.add_command(command);
                    } else {
                        log::warn!("Command \"{command}\" in {} has no useable data.", path.display());
                    }
                }
            }
        }
        Ok(node)
    }

    /// Imports every file, logging and skipping the ones that fail.
    pub fn import_all<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<PhysicalNode> {
        paths
            .iter()
            .filter_map(|path| match self.import(path) {
                Ok(node) => Some(node),
                Err(err) => {
                    log::error!("Import of {} failed: {err}", path.as_ref().display());
                    None
                }
            })
            .collect()
    }
}
