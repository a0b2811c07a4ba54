mod todo;

use std::process;
use std::rc::{Rc, Weak};
use std::time::Duration;

use templatekit_core::{
    AsyncList, ComponentError, Event, EventKind, EventTarget, ImageProperties, ImageSource,
    IndexPath, Node, OwnerRegistry, TextProperties,
};
use templatekit_runtime_std::{RendererConfig, StdRuntime, ThreadPoolRenderer};

use todo::TodoSource;

const FRAME_BUDGET: Duration = Duration::from_secs(5);

/// Owner of every row node. Finds the row a gesture landed in and forwards
/// the event to that row's component.
struct TodoScreen {
    list: AsyncList,
    source: Rc<TodoSource>,
}

impl EventTarget for TodoScreen {
    fn handle_event(&self, event: &Event) {
        let path = self.list.with_cache(|cache| {
            cache
                .nodes()
                .find(|(_, node)| node.find(event.source).is_some())
                .map(|(path, _)| path)
        });
        let Some(host) = path.and_then(|path| self.source.host_at(path)) else {
            log::debug!("{:?} on node {} outside the list", event.kind, event.source);
            return;
        };
        host.handle_event(event);
    }
}

fn row_text(node: &Node) -> String {
    node.children()
        .iter()
        .filter_map(|child| child.element().properties::<TextProperties>())
        .map(TextProperties::text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_checked(node: &Node) -> bool {
    node.children()
        .first()
        .and_then(|check| check.element().properties::<ImageProperties>())
        .is_some_and(|check| check.source == Some(ImageSource::Named("checked".into())))
}

fn print_list(list: &AsyncList, heading: &str) {
    println!("-- {heading}");
    for section in 0..list.section_count() {
        println!("  section {section}");
        for row in 0..list.row_count(section).unwrap_or(0) {
            let path = IndexPath::new(section, row);
            match list.node_at(path) {
                Some(node) => {
                    let check = if is_checked(&node) { "[x]" } else { "[ ]" };
                    println!("    {path} {check} {}", row_text(&node));
                }
                None => println!("    {path} <empty>"),
            }
        }
    }
}

fn settle(runtime: &StdRuntime, list: &AsyncList) {
    match runtime.run_until(|| list.is_idle(), FRAME_BUDGET) {
        Ok(true) => {}
        Ok(false) => log::warn!("list still busy after {FRAME_BUDGET:?}"),
        Err(err) => fail(err),
    }
}

fn fail(err: ComponentError) -> ! {
    log::error!("component render failed: {err}");
    process::exit(1);
}

fn tap(list: &AsyncList, owners: &OwnerRegistry, path: IndexPath, kind: EventKind) {
    match list.node_at(path) {
        Some(node) => {
            let target = node.children().last().map_or(node.id(), Node::id);
            if !node.dispatch(target, kind, owners) {
                log::warn!("{kind:?} at {path} was not handled");
            }
        }
        None => log::warn!("no node at {path} to receive {kind:?}"),
    }
}

fn main() {
    env_logger::init();

    println!("=== TemplateKit-RS List Example ===");
    println!("Rows render on worker threads while mutations apply in order:");
    println!("  - reload, insert, move and delete through one operation queue");
    println!("  - taps routed from cached nodes to their row components");
    println!("  - only the row whose state changed is re-rendered");
    println!();
    println!("Set TEMPLATEKIT_RENDER_WORKERS to change the render thread count.");
    println!();

    let runtime = StdRuntime::new();
    let config = RendererConfig::from_env();
    let renderer = match ThreadPoolRenderer::new(config.clone()) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("could not start {} render workers: {err}", config.workers);
            process::exit(1);
        }
    };

    let source = TodoSource::new(runtime.runtime_handle());
    for titles in [&["milk", "eggs", "bread"][..], &["laundry", "dishes"][..]] {
        if let Err(err) = source.push_section(titles) {
            fail(err);
        }
    }

    let list = AsyncList::new(&runtime.runtime(), source.clone(), Rc::new(renderer));
    let owners = OwnerRegistry::new();
    let screen = Rc::new(TodoScreen {
        list: list.clone(),
        source: Rc::clone(&source),
    });
    list.set_event_target(Some(
        owners.register(Rc::downgrade(&screen) as Weak<dyn EventTarget>),
    ));

    {
        let list = list.clone();
        let rows = Rc::downgrade(&source);
        source.on_row_rendered(move |title| {
            let path = rows.upgrade().and_then(|rows| rows.path_of(title));
            if let Some(path) = path {
                list.reload_items(vec![path], || {});
            }
        });
    }

    list.reload_data(|| log::info!("initial load finished"));
    settle(&runtime, &list);
    print_list(&list, "loaded");

    tap(&list, &owners, IndexPath::new(0, 1), EventKind::Tap);
    tap(&list, &owners, IndexPath::new(1, 0), EventKind::LongPress);
    settle(&runtime, &list);
    print_list(&list, "after tapping eggs and long-pressing laundry");

    let inserted = IndexPath::new(0, 0);
    if let Err(err) = source.insert(inserted, "coffee") {
        fail(err);
    }
    list.insert_items(vec![inserted], || log::info!("coffee inserted"));

    let (from, to) = (IndexPath::new(0, 3), IndexPath::new(1, 0));
    source.move_row(from, to);
    list.move_item(from, to, || log::info!("bread moved to chores"));

    let removed = IndexPath::new(1, 2);
    source.remove(removed);
    list.delete_items(vec![removed], || log::info!("dishes removed"));

    settle(&runtime, &list);
    print_list(&list, "after insert, move and delete");
}
