use quiz_core::model::{Attempt, SessionMode};
use services::{AnswerOutcome, SessionEngine, SessionError, SessionPhase, StartOutcome};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// One line of user input during a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Next,
    Previous,
    Answer(u32),
    Bookmark,
    Finish,
    ReviewAgain,
    Quit,
    Help,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    let input = match head {
        "n" => Input::Next,
        "p" => Input::Previous,
        "b" => Input::Bookmark,
        "f" => Input::Finish,
        "r" => Input::ReviewAgain,
        "q" => Input::Quit,
        "h" | "?" => Input::Help,
        "a" => {
            let shown: u32 = parts.next()?.parse().ok()?;
            Input::Answer(shown.checked_sub(1)?)
        }
        // A bare number answers directly.
        other => Input::Answer(other.parse::<u32>().ok()?.checked_sub(1)?),
    };
    if parts.next().is_some() {
        return None;
    }
    Some(input)
}

const HELP: &str = "commands: n next, p previous, a <k> answer option k, b bookmark, f finish, r review again, q quit";

/// Drive `engine` from stdin until the user quits or input ends.
///
/// # Errors
///
/// Returns storage and I/O failures. Navigation and answer mistakes are reported inline.
pub async fn run(
    engine: &mut SessionEngine,
    mode: SessionMode,
    chapter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    match engine.start(mode, chapter).await? {
        StartOutcome::Resumed => println!("Resuming your {mode} session."),
        StartOutcome::Fresh => println!("Starting a new {mode} session."),
    }
    println!("{HELP}");
    render(engine).await?;

    let mut lines: Lines<BufReader<Stdin>> = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = parse_input(&line) else {
            if !line.trim().is_empty() {
                println!("? {HELP}");
            }
            continue;
        };

        match input {
            Input::Quit => {
                if engine.phase() == SessionPhase::Active {
                    println!("Progress saved. Run the same quiz command to resume.");
                }
                return Ok(());
            }
            Input::Help => println!("{HELP}"),
            Input::Next => report(engine.next().await.map(|_| ()))?,
            Input::Previous => report(engine.previous().await.map(|_| ()))?,
            Input::Answer(option) => match engine.select_answer(option).await {
                Ok(AnswerOutcome::Locked { kept }) => {
                    println!("Answer already locked in: option {}.", kept + 1);
                }
                other => report(other.map(|_| ()))?,
            },
            Input::Bookmark => match engine.toggle_bookmark().await {
                Ok(true) => println!("Bookmarked."),
                Ok(false) => println!("Bookmark removed."),
                Err(err) => report(Err(err))?,
            },
            Input::Finish => match engine.finish().await {
                Ok(attempt) => {
                    print_result(&attempt);
                    println!("r to review again, q to quit");
                    continue;
                }
                Err(err) => report(Err(err))?,
            },
            Input::ReviewAgain => report(engine.review_again().await)?,
        }

        if engine.phase() == SessionPhase::Active {
            render(engine).await?;
        }
    }
    Ok(())
}

/// Print recoverable session mistakes; pass everything else up.
fn report(result: Result<(), SessionError>) -> Result<(), SessionError> {
    match result {
        Ok(()) => Ok(()),
        Err(
            err @ (SessionError::AtFirstQuestion
            | SessionError::AtLastQuestion
            | SessionError::InvalidOption { .. }
            | SessionError::NotActive
            | SessionError::NotComplete),
        ) => {
            println!("! {err}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn render(engine: &SessionEngine) -> Result<(), SessionError> {
    let Some(session) = engine.session() else {
        return Ok(());
    };
    let Some(question) = session.current_question() else {
        return Ok(());
    };
    let bookmarked = engine.current_is_bookmarked().await?;
    let progress = session.progress();

    println!();
    println!(
        "[{}/{}] {} ({}, {} answered){}",
        progress.position + 1,
        progress.total,
        question.chapter(),
        session.mode(),
        progress.answered,
        if bookmarked { " *bookmarked*" } else { "" }
    );
    println!("{}", question.text());
    let selected = session.current_answer();
    for (idx, option) in (0_u32..).zip(question.options()) {
        let marker = if selected == Some(idx) { '>' } else { ' ' };
        println!(" {marker} {}) {option}", idx + 1);
    }

    if let Some(feedback) = session.feedback() {
        if feedback.is_correct() {
            println!("Correct.");
        } else {
            println!(
                "Incorrect. Answer: {}) {}",
                feedback.correct + 1,
                question.correct_option().unwrap_or_default()
            );
        }
        if !question.explanation().is_empty() {
            println!("{}", question.explanation());
        }
    }
    Ok(())
}

fn print_result(attempt: &Attempt) {
    println!();
    println!(
        "Finished {} ({}): {}/{} correct ({}%)",
        attempt.chapter(),
        attempt.mode(),
        attempt.score(),
        attempt.total(),
        attempt.percentage()
    );
}
