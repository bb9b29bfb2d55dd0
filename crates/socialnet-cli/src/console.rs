//! Interactive menu over stdin/stdout.

use socialnet_client::{
    Clock, CommandError, FollowOutcome, MessageOutcome, PostOutcome, RequestChannel, Session,
    TimelineView, UsernamePrompt,
};
use socialnet_core::Status;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const MENU: &str = "\
1. Post text
2. Follow user
3. Send private message
4. Check notifications
5. View timeline
6. Set clock delay
7. Exit";

/// Line-oriented access to the terminal.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and read one trimmed line. `None` at end of input.
    pub async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    /// Keep asking until a non-empty answer arrives.
    pub async fn ask_non_empty(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            match self.ask(prompt).await? {
                Some(answer) if answer.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}

impl UsernamePrompt for Console {
    async fn retry(&mut self, rejected: &str, status: Status) -> Option<String> {
        println!("Username '{rejected}' was not accepted ({status}). Try another one.");
        match self.ask_non_empty("Username: ").await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Failed to read username: {}", e);
                None
            }
        }
    }
}

/// Run the menu until the user exits, input ends, or the connection fails.
pub async fn run<R, C>(console: &mut Console, mut session: Session<R, C>) -> anyhow::Result<()>
where
    R: RequestChannel,
    C: Clock,
{
    let result = menu(console, &mut session).await;
    let exit = session.shutdown().await;
    tracing::debug!(?exit, "Notification listener stopped");
    result
}

async fn menu<R, C>(console: &mut Console, session: &mut Session<R, C>) -> anyhow::Result<()>
where
    R: RequestChannel,
    C: Clock,
{
    let mut warned = false;
    loop {
        if !warned && session.listener_stopped() {
            println!("Notifications are no longer being received.");
            warned = true;
        }

        println!("\n{MENU}");
        let Some(choice) = console.ask("Choose an option: ").await? else {
            return Ok(());
        };

        let result = match choice.as_str() {
            "1" => post(console, session).await,
            "2" => follow(console, session).await,
            "3" => message(console, session).await,
            "4" => {
                print!("{}", session.check_notifications());
                Ok(())
            }
            "5" => timeline(session).await,
            "6" => delay(console, session).await,
            "7" => return Ok(()),
            _ => {
                println!("Invalid option, choose 1-7.");
                continue;
            }
        };

        match result {
            Ok(()) => {}
            Err(ActionError::Command(e)) if e.is_fatal() => return Err(e.into()),
            Err(ActionError::Command(e)) => println!("{e}"),
            Err(ActionError::Input(e)) => return Err(e.into()),
            Err(ActionError::EndOfInput) => return Ok(()),
        }
    }
}

enum ActionError {
    Command(CommandError),
    Input(io::Error),
    EndOfInput,
}

impl From<CommandError> for ActionError {
    fn from(e: CommandError) -> Self {
        ActionError::Command(e)
    }
}

impl From<io::Error> for ActionError {
    fn from(e: io::Error) -> Self {
        ActionError::Input(e)
    }
}

async fn read(console: &mut Console, prompt: &str) -> Result<String, ActionError> {
    console
        .ask_non_empty(prompt)
        .await?
        .ok_or(ActionError::EndOfInput)
}

async fn post<R: RequestChannel, C: Clock>(
    console: &mut Console,
    session: &mut Session<R, C>,
) -> Result<(), ActionError> {
    let text = read(console, "Text: ").await?;
    match session.post(&text).await? {
        PostOutcome::Published => println!("Posted."),
        PostOutcome::Failed(status) => println!("Post failed ({status})."),
    }
    Ok(())
}

async fn follow<R: RequestChannel, C: Clock>(
    console: &mut Console,
    session: &mut Session<R, C>,
) -> Result<(), ActionError> {
    let target = read(console, "Username to follow: ").await?;
    match session.follow(&target).await? {
        FollowOutcome::Following => println!("You now follow {target}."),
        FollowOutcome::NotFound => println!("User {target} not found."),
        FollowOutcome::Failed(status) => println!("Could not follow {target} ({status})."),
    }
    Ok(())
}

async fn message<R: RequestChannel, C: Clock>(
    console: &mut Console,
    session: &mut Session<R, C>,
) -> Result<(), ActionError> {
    let recipient = read(console, "Recipient: ").await?;
    if recipient != session.username() {
        print!("{}", session.conversation(&recipient).await?);
    }
    let text = read(console, "Message: ").await?;

    let report = session.send_message(&recipient, &text).await?;
    match report.outcome {
        MessageOutcome::Delivered => {
            println!("Message sent.");
            if let Some(conversation) = report.conversation {
                print!("{conversation}");
            }
        }
        MessageOutcome::RecipientNotFound => println!("User {recipient} not found."),
        MessageOutcome::Failed(status) => println!("Message not sent ({status})."),
    }
    Ok(())
}

async fn timeline<R: RequestChannel, C: Clock>(
    session: &mut Session<R, C>,
) -> Result<(), ActionError> {
    let posts = session.timeline().await?;
    print!("{}", TimelineView(&posts));
    Ok(())
}

async fn delay<R: RequestChannel, C: Clock>(
    console: &mut Console,
    session: &mut Session<R, C>,
) -> Result<(), ActionError> {
    let answer = read(console, "Delay in seconds: ").await?;
    let Ok(secs) = answer.parse::<i64>() else {
        println!("'{answer}' is not a whole number of seconds.");
        return Ok(());
    };
    match session.set_delay(secs) {
        Ok(()) => println!("Clock delay set to {}.", session.delay()),
        Err(e) => println!("{e}"),
    }
    Ok(())
}
