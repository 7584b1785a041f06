//! Interactive shell over a [`ChatSession`].

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use hearth_client::gif::Gif;
use hearth_client::search::{GifPicker, SearchState, UserSearch};
use hearth_client::{AppContext, ChatSession, ClientError, ClientEvent};
use hearth_shared::{ChannelId, RequestId, UserId};
use hearth_store::Message;

use crate::command::{Command, HELP};
use crate::render;

pub struct Shell {
    ctx: Arc<AppContext>,
    session: Option<ChatSession>,
    user_search: Option<UserSearch>,
    gif_picker: Option<GifPicker>,
    gif_results: Vec<Gif>,
    printer: Option<JoinHandle<()>>,
}

impl Shell {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            session: None,
            user_search: None,
            gif_picker: None,
            gif_results: Vec::new(),
            printer: None,
        }
    }

    /// Print notices as they are emitted.
    pub fn spawn_notice_printer(&self) -> JoinHandle<()> {
        let mut events = self.ctx.events().subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ClientEvent::Notice(notice)) => println!("{}", render::notice(&notice)),
                    Ok(ClientEvent::AuthChanged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        })
    }

    /// Run one command.  Returns `false` when the shell should exit.
    pub async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
            Command::Register {
                email,
                password,
                username,
            } => {
                let result = self.ctx.register(&email, &password, &username).await;
                self.enter(result);
            }
            Command::Login { email, password } => {
                let result = self.ctx.sign_in(&email, &password).await;
                self.enter(result);
            }
            Command::Guest => {
                let result = self.ctx.guest().await;
                self.enter(result);
            }
            Command::Logout => self.logout().await,
            other if self.session.is_some() => self.in_session(other).await,
            _ => println!("{}", render::notice(&ClientError::NotSignedIn.notice())),
        }
        true
    }

    fn enter(&mut self, result: hearth_client::Result<ChatSession>) {
        match result {
            Ok(session) => {
                println!("Signed in as {} ({})", session.me().username, session.me().uid);
                self.user_search = Some(session.user_search());
                self.gif_picker = Some(session.gif_picker());
                self.session = Some(session);
            }
            Err(e) => println!("{}", render::notice(&e.notice())),
        }
    }

    async fn logout(&mut self) {
        self.stop_printer();
        self.user_search = None;
        self.gif_picker = None;
        self.gif_results.clear();
        if let Some(session) = self.session.take() {
            if let Err(e) = session.sign_out().await {
                println!("{}", render::notice(&e.notice()));
            } else {
                println!("Signed out.");
            }
        }
    }

    async fn in_session(&mut self, command: Command) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match command {
            Command::Search(prefix) => {
                let Some(search) = self.user_search.as_mut() else {
                    return;
                };
                search.input(&prefix);
                let mut rx = search.subscribe();
                match settled(&mut rx).await {
                    SearchState::Ready { results, .. } if results.is_empty() => {
                        println!("No users found.")
                    }
                    SearchState::Ready { results, .. } => {
                        for entry in results {
                            let relation = session.relation(&entry.uid);
                            println!(
                                "  {}  {}  [{}]",
                                entry.username,
                                entry.uid,
                                render::relation(relation)
                            );
                        }
                    }
                    SearchState::Failed { message, .. } => println!("Search failed: {message}"),
                    SearchState::Idle | SearchState::Loading { .. } => {
                        println!("Type at least two characters.")
                    }
                }
            }
            Command::Add(uid) => {
                let uid = UserId::from(uid.as_str());
                match self.ctx.directory().lookup(&uid).await {
                    Ok(Some(entry)) => {
                        log_err(session.send_friend_request(&uid, &entry.username).await)
                    }
                    Ok(None) => println!("No user with id {uid}."),
                    Err(e) => println!("{}", render::notice(&e.notice())),
                }
            }
            Command::Requests => {
                let received = session.received_requests().borrow().clone();
                let sent = session.sent_requests().borrow().clone();
                println!("Incoming:");
                received.iter().for_each(|r| println!("{}", render::incoming(r)));
                println!("Sent:");
                sent.iter().for_each(|r| println!("{}", render::outgoing(r)));
            }
            Command::Accept(id) => {
                log_err(session.accept_request(&RequestId::from(id.as_str())).await)
            }
            Command::Decline(id) => {
                log_err(session.decline_request(&RequestId::from(id.as_str())).await)
            }
            Command::Friends => {
                let friends = session.friends().borrow().clone();
                if friends.is_empty() {
                    println!("No friends yet. Try /search.");
                }
                for friend in friends {
                    println!("  {}  {}", friend.username, friend.uid);
                }
            }
            Command::Group(name) => log_err(session.create_group(&name).await),
            Command::Channels => {
                let active = session.active_channel().map(|c| c.id.clone());
                for channel in session.channels().borrow().iter() {
                    println!("{}", render::channel(channel, Some(&channel.id) == active.as_ref()));
                }
            }
            Command::Open(id) => {
                if let Ok(channel) = session.select_channel(&ChannelId::from(id.as_str())).await {
                    println!("-- {} --", channel.name);
                    let rx = session.messages();
                    if let Some(old) = self.printer.replace(spawn_message_printer(rx)) {
                        old.abort();
                    }
                }
            }
            Command::Gif(query) => {
                if let Some(n) = query.strip_prefix('#') {
                    let picked = n
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| self.gif_results.get(i));
                    match picked {
                        Some(gif) => log_err(session.send_gif(&gif.url).await),
                        None => println!("No such GIF. Run /gif <query> first."),
                    }
                    return;
                }
                let Some(picker) = self.gif_picker.as_mut() else {
                    return;
                };
                picker.input(&query);
                let mut rx = picker.subscribe();
                match settled(&mut rx).await {
                    SearchState::Ready { results, .. } => {
                        for (i, gif) in results.iter().enumerate() {
                            println!("  #{}  {}", i + 1, gif.preview_url);
                        }
                        self.gif_results = results;
                    }
                    SearchState::Failed { message, .. } => println!("GIFs unavailable: {message}"),
                    _ => {}
                }
            }
            Command::Say(text) => log_err(session.send_text(&text).await),
            Command::Register { .. }
            | Command::Login { .. }
            | Command::Guest
            | Command::Logout
            | Command::Quit
            | Command::Help => {}
        }
    }

    fn stop_printer(&mut self) {
        if let Some(task) = self.printer.take() {
            task.abort();
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.stop_printer();
    }
}

/// Wait for a search to leave the loading state.
async fn settled<T: Clone>(rx: &mut watch::Receiver<SearchState<T>>) -> SearchState<T> {
    match rx
        .wait_for(|state| !matches!(state, SearchState::Loading { .. }))
        .await
    {
        Ok(state) => state.clone(),
        Err(_) => SearchState::Idle,
    }
}

/// Print each message of the open channel once.
fn spawn_message_printer(mut rx: watch::Receiver<Vec<Message>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut shown = HashSet::new();
        loop {
            let window = rx.borrow_and_update().clone();
            for message in window {
                if shown.insert(message.id.clone()) {
                    println!("{}", render::message(&message));
                }
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Outcomes are already reported as notices; keep errors in the log too.
fn log_err<T>(result: hearth_client::Result<T>) {
    if let Err(e) = result {
        debug!(error = %e, "Command failed");
    }
}
