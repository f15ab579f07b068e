use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::analyze::AnalyzerFactory;
use crate::config::Config;
use crate::credentials::{store_from_config, CredentialStore};
use crate::error::{Result, SrtfixError};
use crate::review::ReviewEngine;
use crate::session::{AnalysisOutcome, PotentialError, Session};
use crate::subtitle::{normalize_text, parse_srt, read_srt_file, write_srt};

/// What the operator chose for one flagged error
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Suggestion(usize),
    Edit,
    Save,
    Ignore,
    Skip,
    Quit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        let input = input.trim().to_lowercase();
        if let Ok(n) = input.parse::<usize>() {
            return n.checked_sub(1).map(Self::Suggestion);
        }
        match input.as_str() {
            "e" | "edit" => Some(Self::Edit),
            "y" | "save" => Some(Self::Save),
            "i" | "ignore" => Some(Self::Ignore),
            "s" | "skip" | "" => Some(Self::Skip),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Counts reported at the end of an interactive review
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub saved: usize,
    pub ignored: usize,
    pub skipped: usize,
    pub remaining: usize,
}

pub struct Workflow {
    config: Config,
    engine: ReviewEngine,
    credentials: Box<dyn CredentialStore>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let analyzer = AnalyzerFactory::create(&config.analyzer)?;
        let credentials = store_from_config(&config.credentials);
        Ok(Self::with_parts(config, ReviewEngine::new(analyzer), credentials))
    }

    pub fn with_parts(config: Config, engine: ReviewEngine, credentials: Box<dyn CredentialStore>) -> Self {
        Self {
            config,
            engine,
            credentials,
        }
    }

    /// Read and parse an SRT file into a fresh session
    pub async fn load<P: AsRef<Path>>(&self, input_path: P) -> Result<Session> {
        let input_path = input_path.as_ref();
        let raw = read_srt_file(input_path).await?;
        let file_name = input_path.file_name().map(|name| name.to_string_lossy().to_string());

        let mut session = Session::new();
        session.load_document(&raw, file_name.as_deref())?;
        Ok(session)
    }

    /// Run one analysis pass with a spinner on the terminal
    pub async fn analyze(&self, session: &mut Session) -> Result<AnalysisOutcome> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!(
            "Analyzing {} with {}...",
            session.file_name().unwrap_or("subtitles"),
            self.engine.analyzer_name()
        ));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self.engine.run_analysis(session, self.credentials.as_ref()).await;
        spinner.finish_and_clear();
        result
    }

    /// Analyze a file and print the flagged items
    pub async fn check<P: AsRef<Path>, W: Write>(&self, input_path: P, out: &mut W) -> Result<AnalysisOutcome> {
        let mut session = self.load(input_path).await?;
        let outcome = self.analyze(&mut session).await?;

        if outcome.is_clean() {
            writeln!(out, "No issues found.")?;
        } else {
            writeln!(out, "Potential errors ({}):", session.errors().len())?;
            for error in session.errors() {
                writeln!(
                    out,
                    "  #{} \"{}\" - {} | {} | suggestions: {}",
                    error.subtitle_id,
                    error.original_word,
                    error.reason,
                    error.context,
                    format_suggestions(error)
                )?;
            }
        }
        if outcome.orphaned > 0 {
            writeln!(out, "({} findings referenced unknown subtitles and were dropped)", outcome.orphaned)?;
        }
        Ok(outcome)
    }

    /// Load, analyze, walk every flagged error with the operator and export.
    ///
    /// Returns the path of the corrected file together with a summary.
    pub async fn review<P, R, W>(
        &self,
        input_path: P,
        output_path: Option<&Path>,
        video_path: Option<&Path>,
        input: &mut R,
        out: &mut W,
    ) -> Result<(PathBuf, ReviewSummary)>
    where
        P: AsRef<Path>,
        R: BufRead,
        W: Write,
    {
        let input_path = input_path.as_ref();
        let mut session = self.load(input_path).await?;
        let outcome = self.analyze(&mut session).await?;

        if outcome.is_clean() {
            writeln!(out, "No issues found in {}.", session.file_name().unwrap_or("the file"))?;
        } else {
            writeln!(out, "Found {} potential errors.", outcome.found)?;
        }

        let summary = review_errors(&mut session, video_path, input, out)?;

        let destination = self.export_path(&session, input_path, output_path);
        write_srt(session.subtitles(), &destination).await?;
        writeln!(
            out,
            "Saved {} corrections, ignored {}, skipped {}. Wrote {}",
            summary.saved,
            summary.ignored,
            summary.skipped,
            destination.display()
        )?;

        info!("Review finished: {:?}", summary);
        Ok((destination, summary))
    }

    /// Parse and re-serialize a file without analysis
    pub async fn format<P: AsRef<Path>, Q: AsRef<Path>>(&self, input_path: P, output_path: Q) -> Result<usize> {
        let input_path = input_path.as_ref();
        let raw = read_srt_file(input_path).await?;
        let entries = parse_srt(&raw);
        if entries.is_empty() {
            return Err(SrtfixError::Parse(input_path.display().to_string()));
        }

        write_srt(&entries, output_path).await?;
        Ok(entries.len())
    }

    /// `--output` if given, else `{prefix}{name}` in the configured or source directory
    pub fn export_path(&self, session: &Session, input_path: &Path, output_path: Option<&Path>) -> PathBuf {
        if let Some(path) = output_path {
            return path.to_path_buf();
        }

        let file_name = session.export_file_name(&self.config.export.prefix);
        let directory = match &self.config.export.output_dir {
            Some(dir) => dir.clone(),
            None => input_path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        directory.join(file_name)
    }
}

/// Interactive loop over the outstanding errors of an analyzed session
fn review_errors<R: BufRead, W: Write>(
    session: &mut Session,
    video_path: Option<&Path>,
    input: &mut R,
    out: &mut W,
) -> Result<ReviewSummary> {
    let mut summary = ReviewSummary::default();
    let queue: Vec<String> = session.errors().iter().map(|e| e.id.clone()).collect();
    let total = queue.len();

    'errors: for (position, error_id) in queue.iter().enumerate() {
        // an earlier save on the same entry may have resolved it already
        if session.error(error_id).is_none() {
            continue;
        }
        session.select_error(error_id)?;
        print_error(session, position + 1, total, video_path, out)?;

        loop {
            write!(out, "> ")?;
            out.flush()?;

            let Some(line) = read_line(input)? else {
                session.cancel_edit();
                break 'errors;
            };

            match Command::parse(&line) {
                Some(Command::Suggestion(index)) => {
                    let suggestion = session
                        .selected_error()
                        .and_then(|error| error.suggestions.get(index).cloned());
                    match suggestion {
                        Some(suggestion) => {
                            if session.apply_suggestion(&suggestion) {
                                print_buffer(session, out)?;
                            } else {
                                writeln!(out, "The flagged word is no longer in the text.")?;
                            }
                        }
                        None => writeln!(out, "No suggestion {}.", index + 1)?,
                    }
                }
                Some(Command::Edit) => {
                    writeln!(out, "New text (use \\n for a line break):")?;
                    let Some(text) = read_line(input)? else {
                        session.cancel_edit();
                        break 'errors;
                    };
                    match parse_edit_input(&text) {
                        Some(text) => {
                            session.update_edit_buffer(&text);
                            print_buffer(session, out)?;
                        }
                        None => writeln!(out, "Subtitle text must not be empty.")?,
                    }
                }
                Some(Command::Save) => {
                    if session.save_edit().is_some() {
                        summary.saved += 1;
                        continue 'errors;
                    }
                    writeln!(out, "Subtitle text must not be empty.")?;
                }
                Some(Command::Ignore) => {
                    session.ignore_error();
                    summary.ignored += 1;
                    continue 'errors;
                }
                Some(Command::Skip) => {
                    session.cancel_edit();
                    summary.skipped += 1;
                    continue 'errors;
                }
                Some(Command::Quit) => {
                    session.cancel_edit();
                    break 'errors;
                }
                None => writeln!(out, "Commands: 1-9 suggestion, e edit, y save, i ignore, s skip, q quit")?,
            }
        }
    }

    summary.remaining = session.errors().len();
    Ok(summary)
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        warn!("Input closed, ending review");
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Turn a single typed line into subtitle text. Blank lines would split the
/// block on export, so they are dropped.
fn parse_edit_input(line: &str) -> Option<String> {
    let text = normalize_text(&line.replace("\\n", "\n"));
    (!text.is_empty()).then_some(text)
}

fn format_suggestions(error: &PotentialError) -> String {
    if error.suggestions.is_empty() {
        "(none)".to_string()
    } else {
        error.suggestions.join(", ")
    }
}

fn print_error<W: Write>(
    session: &Session,
    position: usize,
    total: usize,
    video_path: Option<&Path>,
    out: &mut W,
) -> Result<()> {
    let (Some(error), Some(active)) = (session.selected_error(), session.active()) else {
        return Ok(());
    };
    let Some(entry) = session.subtitle(active.subtitle_id) else {
        return Ok(());
    };

    writeln!(out)?;
    writeln!(
        out,
        "[{}/{}] #{} | {} --> {}",
        position, total, entry.id, entry.start_time, entry.end_time
    )?;
    if let Some(video) = video_path {
        writeln!(
            out,
            "  video: {} (seek to {:.3}s)",
            video.display(),
            entry.start_seconds()
        )?;
    }
    writeln!(out, "  \"{}\" - {}", error.original_word, error.reason)?;
    writeln!(out, "  {}", active.buffer.replace('\n', "\n  "))?;
    for (i, suggestion) in error.suggestions.iter().enumerate() {
        writeln!(out, "  {}) {}", i + 1, suggestion)?;
    }
    Ok(())
}

fn print_buffer<W: Write>(session: &Session, out: &mut W) -> Result<()> {
    if let Some(active) = session.active() {
        writeln!(out, "  now: {}", active.buffer.replace('\n', "\n       "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::analyze::{AnalyzerFinding, MockAnalyzer};
    use crate::credentials::MemoryCredentialStore;

    const DOCUMENT: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello wrold\n\n2\n00:00:03,000 --> 00:00:04,000\nTeh end is teh end";

    fn finding(subtitle_id: u32, word: &str, suggestions: &[&str]) -> AnalyzerFinding {
        AnalyzerFinding {
            subtitle_id,
            original_word: word.to_string(),
            context: String::new(),
            reason: "typo".to_string(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn workflow_with(findings: Vec<AnalyzerFinding>) -> Workflow {
        let mut analyzer = MockAnalyzer::new();
        analyzer.expect_name().return_const("Mock");
        analyzer.expect_requires_credential().return_const(true);
        analyzer
            .expect_find_errors()
            .returning(move |_, _| Ok(findings.clone()));

        Workflow::with_parts(
            Config::default(),
            ReviewEngine::new(Box::new(analyzer)),
            Box::new(MemoryCredentialStore::with_secret("key")),
        )
    }

    fn write_input(dir: &assert_fs::TempDir) -> PathBuf {
        let path = dir.path().join("talk.srt");
        std::fs::write(&path, DOCUMENT).unwrap();
        path
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("1"), Some(Command::Suggestion(0)));
        assert_eq!(Command::parse(" Y "), Some(Command::Save));
        assert_eq!(Command::parse(""), Some(Command::Skip));
        assert_eq!(Command::parse("0"), None);
        assert_eq!(Command::parse("what"), None);
    }

    #[test]
    fn test_parse_edit_input() {
        assert_eq!(parse_edit_input("one\\ntwo"), Some("one\ntwo".to_string()));
        assert_eq!(parse_edit_input("one\\n\\n  \\ntwo  "), Some("one\ntwo".to_string()));
        assert_eq!(parse_edit_input("   "), None);
    }

    #[tokio::test]
    async fn test_review_applies_suggestions_and_exports() {
        let dir = assert_fs::TempDir::new().unwrap();
        let input_path = write_input(&dir);
        let workflow = workflow_with(vec![
            finding(1, "wrold", &["world"]),
            finding(2, "teh", &["the"]),
        ]);

        let mut stdin = Cursor::new("1\ny\n1\n1\ny\n");
        let mut stdout = Vec::new();
        let (path, summary) = workflow
            .review(&input_path, None, None, &mut stdin, &mut stdout)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("corrected_talk.srt"));
        assert_eq!(summary, ReviewSummary { saved: 2, ignored: 0, skipped: 0, remaining: 0 });
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Hello world"));
        assert!(written.contains("the end is the end"));
    }

    #[tokio::test]
    async fn test_review_ignore_skip_and_edit() {
        let dir = assert_fs::TempDir::new().unwrap();
        let input_path = write_input(&dir);
        let output_path = dir.path().join("out").join("fixed.srt");
        let workflow = workflow_with(vec![
            finding(1, "wrold", &["world"]),
            finding(2, "teh", &["the"]),
        ]);

        let mut stdin = Cursor::new("i\ne\nThe end\\nis near\ny\n");
        let mut stdout = Vec::new();
        let (path, summary) = workflow
            .review(&input_path, Some(output_path.as_path()), None, &mut stdin, &mut stdout)
            .await
            .unwrap();

        assert_eq!(path, output_path);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.saved, 1);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Hello wrold"));
        assert!(written.ends_with("00:00:03,000 --> 00:00:04,000\nThe end\nis near"));
    }

    #[tokio::test]
    async fn test_review_stops_on_quit_or_eof() {
        let dir = assert_fs::TempDir::new().unwrap();
        let input_path = write_input(&dir);
        let workflow = workflow_with(vec![
            finding(1, "wrold", &["world"]),
            finding(2, "teh", &["the"]),
        ]);

        let mut stdin = Cursor::new("1\nq\n");
        let mut stdout = Vec::new();
        let (path, summary) = workflow
            .review(&input_path, None, Some(Path::new("talk.mp4")), &mut stdin, &mut stdout)
            .await
            .unwrap();

        assert_eq!(summary.remaining, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOCUMENT);
        let shown = String::from_utf8(stdout).unwrap();
        assert!(shown.contains("seek to 1.000s"));
    }

    #[tokio::test]
    async fn test_check_reports_clean_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        let input_path = write_input(&dir);
        let workflow = workflow_with(Vec::new());

        let mut stdout = Vec::new();
        let outcome = workflow.check(&input_path, &mut stdout).await.unwrap();
        assert!(outcome.is_clean());
        assert_eq!(String::from_utf8(stdout).unwrap(), "No issues found.\n");
    }

    #[tokio::test]
    async fn test_unparseable_file_is_parse_error() {
        let dir = assert_fs::TempDir::new().unwrap();
        let input_path = dir.path().join("broken.srt");
        std::fs::write(&input_path, "not a subtitle file").unwrap();
        let workflow = workflow_with(Vec::new());

        let result = workflow.load(&input_path).await;
        assert!(matches!(result, Err(SrtfixError::Parse(name)) if name == "broken.srt"));
        let formatted = workflow.format(&input_path, dir.path().join("x.srt")).await;
        assert!(matches!(formatted, Err(SrtfixError::Parse(_))));
    }

    #[tokio::test]
    async fn test_format_normalizes_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        let input_path = dir.path().join("messy.srt");
        std::fs::write(&input_path, "1\r\n00:00:01,000-->00:00:02,000\r\nHi\r\n\r\n\r\n").unwrap();
        let output_path = dir.path().join("clean.srt");

        let count = workflow_with(Vec::new()).format(&input_path, &output_path).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            std::fs::read_to_string(&output_path).unwrap(),
            "1\n00:00:01,000 --> 00:00:02,000\nHi"
        );
    }
}
