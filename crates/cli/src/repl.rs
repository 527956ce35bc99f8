#![forbid(unsafe_code)]

//! Line commands driving one session.

use crate::CliError;
use crate::terminal::SharedLines;
use sp_core::{Node, NodeId, Position, Tag, TagDraft, TagId};
use sp_engine::{ContextMenu, GestureEvent, Outcome, Session, TapOutcome};
use std::collections::HashMap;
use std::io::Write as _;
use tracing::{debug, warn};

const HELP: &str = "\
commands:
  show                         print the tree
  tap <node>                   confirm, fill or edit a node
  drag <node> <x> <y>          move a node
  menu <node>                  tags on and off a node
  tag <tag> <node> [--deep]    attach a tag (by id or name)
  untag <tag> <node> [--deep]  detach a tag
  highlight <tag>|off          highlight every node carrying a tag
  tags                         list the tag catalog
  newtag <name>                create a tag
  summary <tag>                refresh a tag summary
  deltag <tag>                 delete a tag
  quit";

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    Help,
    Show,
    Tap(String),
    Drag { node: String, position: Position },
    Menu(String),
    Tag { tag: String, node: String, deep: bool },
    Untag { tag: String, node: String, deep: bool },
    Highlight(Option<String>),
    Tags,
    NewTag(String),
    Summary(String),
    DeleteTag(String),
    Quit,
}

pub(crate) fn parse(line: &str) -> Result<Option<Command>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, rest)) = words.split_first() else {
        return Ok(None);
    };
    let one = |what: &str| -> Result<String, String> {
        match rest {
            [value] => Ok((*value).to_string()),
            _ => Err(format!("usage: {head} <{what}>")),
        }
    };
    let command = match head {
        "help" | "?" => Command::Help,
        "show" => Command::Show,
        "tags" => Command::Tags,
        "quit" | "exit" => Command::Quit,
        "tap" => Command::Tap(one("node")?),
        "menu" => Command::Menu(one("node")?),
        "summary" => Command::Summary(one("tag")?),
        "deltag" => Command::DeleteTag(one("tag")?),
        "newtag" if !rest.is_empty() => Command::NewTag(rest.join(" ")),
        "newtag" => return Err("usage: newtag <name>".to_string()),
        "highlight" => match one("tag")?.as_str() {
            "off" => Command::Highlight(None),
            tag => Command::Highlight(Some(tag.to_string())),
        },
        "drag" => match rest {
            [node, x, y] => {
                let coord = |v: &str| {
                    v.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| format!("not a coordinate: {v}"))
                };
                Command::Drag {
                    node: (*node).to_string(),
                    position: Position::new(coord(x)?, coord(y)?),
                }
            }
            _ => return Err("usage: drag <node> <x> <y>".to_string()),
        },
        "tag" | "untag" => {
            let deep = rest.contains(&"--deep");
            let args: Vec<&str> = rest.iter().copied().filter(|w| *w != "--deep").collect();
            let [tag, node] = args.as_slice() else {
                return Err(format!("usage: {head} <tag> <node> [--deep]"));
            };
            let (tag, node) = (tag.to_string(), node.to_string());
            if head == "tag" {
                Command::Tag { tag, node, deep }
            } else {
                Command::Untag { tag, node, deep }
            }
        }
        other => return Err(format!("unknown command {other:?}, try help")),
    };
    Ok(Some(command))
}

pub(crate) async fn run(session: &Session, lines: SharedLines) -> Result<(), CliError> {
    println!("{HELP}");
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = lines.lock().await.next_line().await?;
        let Some(line) = line else {
            break;
        };
        match parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = execute(session, command).await {
                    report(&err);
                }
            }
            Err(usage) => println!("{usage}"),
        }
    }
    session.close();
    Ok(())
}

/// Remote failures already reached the terminal as a notice.
fn report(err: &CliError) {
    match err {
        CliError::Engine(err) if err.is_remote() => debug!(error = %err, "command failed"),
        err => println!("error: {err}"),
    }
}

async fn execute(session: &Session, command: Command) -> Result<(), CliError> {
    match command {
        Command::Help => println!("{HELP}"),
        Command::Show => {
            for line in outline(&session.nodes(), &tag_names(session)) {
                println!("{line}");
            }
        }
        Command::Tap(node) => {
            let outcome = session.handle(GestureEvent::Tap(node_id(&node)?)).await?;
            if let Outcome::Tap(tap) = outcome {
                println!("{}", describe_tap(&tap));
            }
        }
        Command::Drag { node, position } => {
            let event = GestureEvent::DragEnd {
                node: node_id(&node)?,
                position,
            };
            if let Outcome::Moved(task) = session.handle(event).await? {
                if let Err(err) = task.await {
                    warn!(error = %err, "position task aborted");
                }
            }
        }
        Command::Menu(node) => {
            let event = GestureEvent::RightClick {
                node: node_id(&node)?,
                screen: Position::default(),
            };
            if let Outcome::Menu(menu) = session.handle(event).await? {
                print_menu(&menu);
            }
        }
        Command::Tag { tag, node, deep } => {
            let tag = resolve_tag(session, &tag)?;
            let change = session
                .attach_tag(&tag, &node_id(&node)?, deep.then_some(true))
                .await?;
            println!(
                "tagged {} node(s), {} already tagged",
                change.applied.len(),
                change.unchanged.len()
            );
        }
        Command::Untag { tag, node, deep } => {
            let tag = resolve_tag(session, &tag)?;
            let change = session
                .detach_tag(&tag, &node_id(&node)?, deep.then_some(true))
                .await?;
            println!(
                "untagged {} node(s), {} were not tagged",
                change.applied.len(),
                change.unchanged.len()
            );
        }
        Command::Highlight(tag) => {
            let tag = tag.map(|t| resolve_tag(session, &t)).transpose()?;
            session.tags().select(tag);
        }
        Command::Tags => {
            for tag in session.tags().tags() {
                println!("{}", describe_tag(&tag));
            }
        }
        Command::NewTag(name) => {
            let tag = session
                .tags()
                .create_tag(TagDraft {
                    name: Some(name),
                    ..TagDraft::default()
                })
                .await?;
            println!("{}", describe_tag(&tag));
        }
        Command::Summary(tag) => {
            let tag = resolve_tag(session, &tag)?;
            let tag = session.tags().refresh_summary(&tag).await?;
            println!("{}", describe_tag(&tag));
        }
        Command::DeleteTag(tag) => {
            let tag = resolve_tag(session, &tag)?;
            session.tags().delete_tag(&tag).await?;
            println!("deleted {tag}");
        }
        Command::Quit => {}
    }
    Ok(())
}

fn node_id(value: &str) -> Result<NodeId, CliError> {
    NodeId::try_new(value).map_err(|err| CliError::Usage(format!("node {value:?}: {}", err.message())))
}

/// Catalog id first, then normalized name.
fn resolve_tag(session: &Session, value: &str) -> Result<TagId, CliError> {
    let tags = session.tags();
    if let Some(tag) = TagId::try_new(value).ok().and_then(|id| tags.tag(&id)) {
        return Ok(tag.id);
    }
    tags.find_by_name(value)
        .map(|tag| tag.id)
        .ok_or_else(|| CliError::Usage(format!("unknown tag {value:?}")))
}

fn tag_names(session: &Session) -> HashMap<TagId, String> {
    session
        .tags()
        .tags()
        .into_iter()
        .map(|tag| (tag.id, tag.name))
        .collect()
}

fn describe_tap(outcome: &TapOutcome) -> String {
    use sp_engine::Spawn;
    let spawn = |spawn: &Spawn| match spawn {
        Spawn::AlreadyGenerated => "already expanded".to_string(),
        Spawn::InProgress => "expansion still running".to_string(),
        Spawn::Created {
            children,
            suggested,
            blank,
        } => format!(
            "{} proposal(s): {suggested} suggested, {blank} blank",
            children.len()
        ),
    };
    match outcome {
        TapOutcome::Cancelled => "cancelled".to_string(),
        TapOutcome::NoChange => "unchanged".to_string(),
        TapOutcome::Activated => "confirmed".to_string(),
        TapOutcome::Edited(s) => format!("confirmed, {}", spawn(s)),
        TapOutcome::Renamed(None) => "renamed".to_string(),
        TapOutcome::Renamed(Some(s)) => format!("renamed, {}", spawn(s)),
        TapOutcome::Expanded(s) => spawn(s),
    }
}

fn describe_tag(tag: &Tag) -> String {
    let mut line = format!("{} {:?} nodes={}", tag.id, tag.name, tag.node_count);
    if let Some(summary) = &tag.summary {
        line.push_str(&format!(" summary={summary:?}"));
    }
    line
}

fn print_menu(menu: &ContextMenu) {
    let names = |tags: &[Tag]| {
        tags.iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("{}: attached [{}]", menu.node, names(&menu.attached));
    println!("{}: available [{}]", menu.node, names(&menu.available));
}

/// Indented depth-first listing starting at each root, children in
/// `order_index` order.
pub(crate) fn outline(nodes: &[Node], tag_names: &HashMap<TagId, String>) -> Vec<String> {
    let mut children: HashMap<Option<&NodeId>, Vec<&Node>> = HashMap::new();
    for node in nodes {
        children.entry(node.parent_id.as_ref()).or_default().push(node);
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|n| n.order_index);
    }

    let mut out = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(&Node, usize)> = children
        .get(&None)
        .into_iter()
        .flatten()
        .rev()
        .map(|n| (*n, 0))
        .collect();
    while let Some((node, indent)) = stack.pop() {
        let state = if node.is_ghost() { "ghost" } else { "active" };
        let mut line = format!("{}{} [{state}] {}", "  ".repeat(indent), node.id, node.label());
        if !node.tags.is_empty() {
            let names: Vec<&str> = node
                .tags
                .iter()
                .map(|t| tag_names.get(t).map_or(t.as_str(), String::as_str))
                .collect();
            line.push_str(&format!(" #{}", names.join(" #")));
        }
        out.push(line);
        if let Some(kids) = children.get(&Some(&node.id)) {
            stack.extend(kids.iter().rev().map(|n| (*n, indent + 1)));
        }
    }
    if out.len() < nodes.len() {
        debug!(
            unreachable = nodes.len() - out.len(),
            "nodes outside the root tree"
        );
    }
    out
}
