//! Splits a captured terminal session into one temporary file per `show` command.
//!
//! A command line is a device prompt followed by `show` (or an abbreviation of at least two
//! letters), e.g. `core-sw1#sh run`. Everything up to the next command line belongs to that
//! command's section.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use super::text;
use crate::error::ImportError;

const COMMAND_SEPARATOR: char = '#';
const COMMAND_TEXT: &str = "show";
/// Prefix that runs exec commands from configuration mode.
const EXEC_PREFIX: &str = "do";
/// Echoed under a command the device rejected.
const INVALID_MARKER: &str = "^";

#[derive(Clone, Debug)]
pub struct SplitterOptions {
    /// Sections of this many lines or fewer, counting the command line, are noise.
    pub lines_required: usize,
    /// Where section files go. Defaults to the system temp directory.
    pub output_dir: Option<PathBuf>,
    /// Leave section files on disk after the splitter is dropped.
    pub keep_files: bool,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            lines_required: 5,
            output_dir: None,
            keep_files: false,
        }
    }
}

/// One command's output, stored in its own file.
#[derive(Debug)]
pub struct Section {
    pub command: String,
    /// 1-based line of the command in the source file.
    pub first_line: usize,
    pub last_line: usize,
    path: PathBuf,
    /// Removes the file on drop unless the section was kept.
    _temp: Option<TempPath>,
}

impl Section {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cleaned output lines, without the command line itself.
    pub fn read_lines(&self) -> Result<Vec<String>, ImportError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut lines = Vec::new();
        for raw in reader.split(b'\n').skip(1) {
            lines.push(text::clean_line(&String::from_utf8_lossy(&raw?)));
        }
        Ok(lines)
    }
}

struct Pending {
    command_line: String,
    command: String,
    line: usize,
    body: Vec<String>,
}

#[derive(Debug)]
pub struct CommandSplitter {
    source: PathBuf,
    device_name: Option<String>,
    sections: BTreeMap<String, Section>,
    line_count: usize,
}

impl CommandSplitter {
    pub fn split(path: impl AsRef<Path>, options: &SplitterOptions) -> Result<Self, ImportError> {
        let source = path.as_ref().to_path_buf();
        let reader = BufReader::new(File::open(&source)?);
        let mut splitter = CommandSplitter {
            source,
            device_name: None,
            sections: BTreeMap::new(),
            line_count: 0,
        };

        let mut pending: Option<Pending> = None;
        for raw in reader.split(b'\n') {
            let raw = raw?;
            splitter.line_count += 1;
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();

            if let Some((device, command)) = parse_prompt(&line) {
                if !device.is_empty() {
                    splitter.device_name = Some(device.to_string());
                }
                let next = Pending {
                    command: command.to_string(),
                    command_line: line.clone(),
                    line: splitter.line_count,
                    body: Vec::new(),
                };
                if let Some(done) = pending.replace(next) {
                    splitter.flush(done, options)?;
                }
            } else if let Some(current) = pending.as_mut() {
                if line.trim() == INVALID_MARKER {
                    current.body.clear();
                } else {
                    current.body.push(line);
                }
            }
        }
        if let Some(done) = pending {
            splitter.flush(done, options)?;
        }

        log::info!(
            "Split {} into {} command section(s) over {} lines",
            splitter.source.display(),
            splitter.sections.len(),
            splitter.line_count
        );
        Ok(splitter)
    }

    fn flush(&mut self, pending: Pending, options: &SplitterOptions) -> Result<(), ImportError> {
        let lines = pending.body.len() + 1;
        let last_line = pending.line + pending.body.len();
        if lines <= options.lines_required {
            log::debug!(
                "Dropping lines {}-{}: {}",
                pending.line,
                last_line,
                pending.command_line
            );
            return Ok(());
        }
        if pending.command.is_empty() {
            log::warn!("Ignoring empty command on line {} of {}", pending.line, self.source.display());
            return Ok(());
        }
        if self.sections.contains_key(&pending.command) {
            return Err(ImportError::DuplicateCommand(pending.command));
        }

        let dir = options.output_dir.clone().unwrap_or_else(std::env::temp_dir);
        let prefix = format!(
            "cisco-{}-",
            pending.command.replace(|c: char| !c.is_ascii_alphanumeric(), "_")
        );
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".txt")
            .tempfile_in(&dir)?;
        writeln!(file, "{}", pending.command_line)?;
        for line in &pending.body {
            writeln!(file, "{line}")?;
        }
        file.flush()?;

        let temp = file.into_temp_path();
        let (path, temp) = if options.keep_files {
            (temp.keep().map_err(|err| err.error)?, None)
        } else {
            (temp.to_path_buf(), Some(temp))
        };
        log::debug!("Lines {}-{} -> {}", pending.line, last_line, path.display());

        self.sections.insert(
            pending.command.clone(),
            Section {
                command: pending.command,
                first_line: pending.line,
                last_line,
                path,
                _temp: temp,
            },
        );
        Ok(())
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Prompt text of the last command line, empty if none was seen.
    pub fn device_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or_default()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn section(&self, command: &str) -> Option<&Section> {
        self.sections.get(command)
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Splits `device#show command` (or `device(config)#do show command`) into device and command.
fn parse_prompt(line: &str) -> Option<(&str, &str)> {
    let sep = line.find(COMMAND_SEPARATOR)?;
    let mut rest = &line[sep + COMMAND_SEPARATOR.len_utf8()..];
    if text::first_word(rest).eq_ignore_ascii_case(EXEC_PREFIX) {
        rest = text::after(rest, text::first_word(rest));
    }
    let word = text::first_word(rest);
    if word.len() < 2 || !COMMAND_TEXT.starts_with(word.to_ascii_lowercase().as_str()) {
        return None;
    }
    // drop a configuration mode suffix such as `(config-if)`
    let device = line[..sep].trim();
    let device = device.find('(').map_or(device, |pos| &device[..pos]);
    Some((device, text::after(rest, word)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("session.txt");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn section(prompt: &str, command: &str, body_lines: usize) -> String {
        let mut out = format!("{prompt}#show {command}\n");
        for i in 0..body_lines {
            out.push_str(&format!("{command} line {i}\n"));
        }
        out
    }

    #[test]
    fn prompts() {
        assert_eq!(parse_prompt("sw1#show arp"), Some(("sw1", "arp")));
        assert_eq!(parse_prompt("core-sw1#sh  ip arp "), Some(("core-sw1", "ip arp")));
        assert_eq!(parse_prompt("sw1#show"), Some(("sw1", "")));
        assert_eq!(parse_prompt("sw1(config)#do show run"), Some(("sw1", "run")));
        assert_eq!(parse_prompt("sw1(config-if)#do sh ip arp"), Some(("sw1", "ip arp")));
        assert_eq!(parse_prompt("sw1(config)#do"), None);
        assert_eq!(parse_prompt("sw1#s arp"), None);
        assert_eq!(parse_prompt("sw1#dir flash:"), None);
        assert_eq!(parse_prompt("interface Gi0/1"), None);
    }

    #[test]
    fn short_sections_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let text = section("sw1", "arp", 4) + &section("sw1", "version", 5);
        let splitter = CommandSplitter::split(dump(dir.path(), &text), &SplitterOptions::default()).unwrap();

        assert_eq!(splitter.commands().collect::<Vec<_>>(), vec!["version"]);
        assert_eq!(splitter.device_name(), "sw1");
        assert_eq!(splitter.line_count(), 11);

        let version = splitter.section("version").unwrap();
        assert_eq!((version.first_line, version.last_line), (6, 11));
        let lines = version.read_lines().unwrap();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "version line 0");
    }

    #[test]
    fn rejected_commands_reset_the_section() {
        let dir = tempfile::tempdir().unwrap();
        let text = "sw1#show arpp\n\
                    a\nb\nc\nd\n\
                    \x20       ^\n\
                    % Invalid input detected at '^' marker.\n";
        let splitter = CommandSplitter::split(dump(dir.path(), text), &SplitterOptions::default()).unwrap();
        assert!(splitter.is_empty());
        assert_eq!(splitter.device_name(), "sw1");
    }

    #[test]
    fn duplicate_commands_fail() {
        let dir = tempfile::tempdir().unwrap();
        let text = section("sw1", "arp", 6) + &section("sw1", "arp", 6);
        let err = CommandSplitter::split(dump(dir.path(), &text), &SplitterOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::DuplicateCommand(command) if command == "arp"));
    }

    #[test]
    fn section_files_follow_options() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let text = section("sw1", "running-config", 8);

        let options = SplitterOptions {
            output_dir: Some(output.path().to_path_buf()),
            ..Default::default()
        };
        let path = {
            let splitter = CommandSplitter::split(dump(input.path(), &text), &options).unwrap();
            let path = splitter.section("running-config").unwrap().path().to_path_buf();
            assert!(path.starts_with(output.path()));
            assert!(path.file_name().unwrap().to_string_lossy().starts_with("cisco-running_config-"));
            assert!(path.exists());
            path
        };
        assert!(!path.exists());

        let options = SplitterOptions {
            keep_files: true,
            ..options
        };
        let splitter = CommandSplitter::split(dump(input.path(), &text), &options).unwrap();
        let kept = splitter.section("running-config").unwrap().path().to_path_buf();
        drop(splitter);
        assert!(kept.exists());
    }
}
