//! Assignment polling.
//!
//! The loop asks an action source what to do next: poll the service once
//! more, or stop. The interactive prompt is one such source; tests supply
//! scripted ones.

use crate::error::Result;
use crate::publisher::service::{AssignmentListing, TaskService};
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

/// Sentinel the operator types to stop polling.
pub const QUIT_SENTINEL: &str = "q";

/// What the poll loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    Poll,
    Quit,
}

impl PollAction {
    /// Interpret one line of operator input. Only an exact `q` quits.
    pub fn from_input(line: &str) -> Self {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line == QUIT_SENTINEL {
            PollAction::Quit
        } else {
            PollAction::Poll
        }
    }
}

/// Source of poll decisions.
pub trait NextAction {
    fn next_action(&mut self) -> io::Result<PollAction>;
}

impl<F> NextAction for F
where
    F: FnMut() -> io::Result<PollAction>,
{
    fn next_action(&mut self) -> io::Result<PollAction> {
        self()
    }
}

/// Reads decisions from a line-oriented input after printing a prompt.
pub struct OperatorPrompt<R, W> {
    input: R,
    output: W,
    prompt: String,
}

impl OperatorPrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on stdout, read from stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> OperatorPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            prompt: "press enter to poll results".to_string(),
        }
    }
}

impl<R: BufRead, W: Write> NextAction for OperatorPrompt<R, W> {
    fn next_action(&mut self) -> io::Result<PollAction> {
        write!(self.output, "{}", self.prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            debug!("Operator input closed");
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input closed before '{}' was entered", QUIT_SENTINEL),
            ));
        }

        Ok(PollAction::from_input(&line))
    }
}

/// Poll submitted assignments until the action source says quit.
///
/// Returns the number of completed polls. Any service error ends the loop.
pub async fn poll_assignments<S, A, F>(
    service: &S,
    hit_id: &str,
    actions: &mut A,
    mut on_listing: F,
) -> Result<usize>
where
    S: TaskService + ?Sized,
    A: NextAction,
    F: FnMut(&AssignmentListing),
{
    let mut polls = 0usize;

    loop {
        match actions.next_action()? {
            PollAction::Quit => {
                info!("Stopped polling HIT {} after {} polls", hit_id, polls);
                break;
            }
            PollAction::Poll => {
                let listing = service.list_submitted_assignments(hit_id).await?;
                polls += 1;
                debug!(
                    "Poll {}: {} submitted assignments",
                    polls, listing.num_results
                );
                on_listing(&listing);
            }
        }
    }

    Ok(polls)
}
