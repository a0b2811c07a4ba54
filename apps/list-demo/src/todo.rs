use std::cell::RefCell;
use std::rc::{Rc, Weak};

use templatekit_core::{
    BaseProperties, Color, Component, ComponentError, ComponentHost, ContentMode, Element,
    ElementType, Event, EventKind, ImageProperties, ImageSource, IndexPath, LayoutProperties,
    ListDataSource, RuntimeHandle, StyleProperties, TextProperties,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TodoState {
    pub done: bool,
    pub starred: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TodoProperties {
    pub title: String,
}

/// One row of the list: a check mark, the title and a star.
pub struct TodoItem;

impl Component for TodoItem {
    type State = TodoState;
    type Properties = TodoProperties;

    fn name(&self) -> &'static str {
        "todo_item"
    }

    fn render(&self, state: &TodoState, properties: &TodoProperties) -> Result<Element, ComponentError> {
        if properties.title.is_empty() {
            return Err(ComponentError::InvalidElement {
                component: self.name(),
                reason: "a todo needs a title".into(),
            });
        }
        let check = Element::new(
            ElementType::IMAGE,
            ImageProperties {
                base: BaseProperties {
                    layout: LayoutProperties::sized(24.0, 24.0),
                    ..BaseProperties::default()
                },
                content_mode: Some(ContentMode::Center),
                source: Some(ImageSource::Named(
                    if state.done { "checked" } else { "unchecked" }.into(),
                )),
            },
        );
        let title = Element::new(
            ElementType::TEXT,
            TextProperties {
                color: Some(if state.done {
                    Color::rgb(0x99, 0x99, 0x99)
                } else {
                    Color::BLACK
                }),
                ..TextProperties::new(properties.title.clone())
            },
        );
        let mut children = vec![check, title];
        if state.starred {
            children.push(Element::new(ElementType::TEXT, TextProperties::new("*")));
        }
        Ok(Element::with_children(
            ElementType::BOX,
            BaseProperties {
                layout: LayoutProperties {
                    height: Some(44.0),
                    flex_grow: Some(1.0),
                    ..LayoutProperties::default()
                },
                style: StyleProperties {
                    background_color: Some(Color::WHITE),
                    ..StyleProperties::default()
                },
                ..BaseProperties::keyed(properties.title.clone())
            },
            children,
        ))
    }

    fn handle_event(&self, event: &Event, state: &mut TodoState, _properties: &TodoProperties) {
        match event.kind {
            EventKind::Tap => state.done = !state.done,
            EventKind::LongPress => state.starred = !state.starred,
            EventKind::DoubleTap => {}
        }
    }
}

type RowListener = Box<dyn Fn(&str)>;

/// The demo's list contents: one mounted [`TodoItem`] per row.
pub struct TodoSource {
    this: Weak<TodoSource>,
    runtime: RuntimeHandle,
    sections: RefCell<Vec<Vec<ComponentHost<TodoItem>>>>,
    listener: RefCell<Option<RowListener>>,
}

impl TodoSource {
    pub fn new(runtime: RuntimeHandle) -> Rc<Self> {
        Rc::new_cyclic(|this| TodoSource {
            this: this.clone(),
            runtime,
            sections: RefCell::new(Vec::new()),
            listener: RefCell::new(None),
        })
    }

    /// Called with a row's title whenever that row re-renders on its own.
    pub fn on_row_rendered(&self, listener: impl Fn(&str) + 'static) {
        *self.listener.borrow_mut() = Some(Box::new(listener));
    }

    pub fn push_section(&self, titles: &[&str]) -> Result<(), ComponentError> {
        let hosts = titles
            .iter()
            .map(|title| self.mount(title))
            .collect::<Result<Vec<_>, _>>()?;
        self.sections.borrow_mut().push(hosts);
        Ok(())
    }

    pub fn insert(&self, path: IndexPath, title: &str) -> Result<(), ComponentError> {
        let host = self.mount(title)?;
        self.sections.borrow_mut()[path.section].insert(path.row, host);
        Ok(())
    }

    pub fn remove(&self, path: IndexPath) {
        self.sections.borrow_mut()[path.section].remove(path.row);
    }

    pub fn move_row(&self, from: IndexPath, to: IndexPath) {
        let mut sections = self.sections.borrow_mut();
        let host = sections[from.section].remove(from.row);
        sections[to.section].insert(to.row, host);
    }

    pub fn host_at(&self, path: IndexPath) -> Option<ComponentHost<TodoItem>> {
        self.sections.borrow().get(path.section)?.get(path.row).cloned()
    }

    pub fn path_of(&self, title: &str) -> Option<IndexPath> {
        self.sections
            .borrow()
            .iter()
            .enumerate()
            .find_map(|(section, hosts)| {
                hosts
                    .iter()
                    .position(|host| host.properties().title == title)
                    .map(|row| IndexPath::new(section, row))
            })
    }

    fn mount(&self, title: &str) -> Result<ComponentHost<TodoItem>, ComponentError> {
        let host = ComponentHost::new(
            self.runtime.clone(),
            TodoItem,
            TodoProperties {
                title: title.to_string(),
            },
        );
        host.mount()?;
        let source = self.this.clone();
        let title = title.to_string();
        host.on_rendered(move |_| {
            if let Some(source) = source.upgrade() {
                if let Some(listener) = source.listener.borrow().as_ref() {
                    listener(&title);
                }
            }
        });
        Ok(host)
    }
}

impl ListDataSource for TodoSource {
    fn element(&self, path: IndexPath) -> Option<Element> {
        self.host_at(path)?.rendered()
    }

    fn total_number_of_sections(&self) -> usize {
        self.sections.borrow().len()
    }

    fn total_number_of_rows(&self, section: usize) -> Option<usize> {
        self.sections.borrow().get(section).map(Vec::len)
    }
}
