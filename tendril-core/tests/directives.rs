//! Integration Tests for Directives
//!
//! Each test boots a small document and checks the rendered markup after
//! data changes and dispatched events.

use tendril_core::app::{self, App};
use tendril_core::{Config, DirectiveError, Document, Element, Error, Event, Key, Value};

fn boot(markup: &str) -> (Document, App) {
    let doc = Document::parse(markup).expect("valid markup");
    let app = app::start(&doc);
    (doc, app)
}

fn by_id(doc: &Document, id: &str) -> Element {
    doc.element_by_id(id)
        .unwrap_or_else(|| panic!("no element with id {id}"))
}

/// Text content follows the data.
#[test]
fn text_follows_data() {
    let (doc, app) = boot(r#"<div a-data="{ message: 'hi' }"><p id="p" a-text="message"></p></div>"#);
    let p = by_id(&doc, "p");
    assert_eq!(p.text_content(), "hi");

    app.data(0).unwrap().set("message", Value::from("bye"));
    assert_eq!(p.text_content(), "bye");
}

/// Text coerces values the way the host prints them.
#[test]
fn text_coercion() {
    let (doc, app) = boot(
        r#"<div a-data="{ n: 1.5, list: [1, 2], none: null }">
             <p id="n" a-text="n * 2"></p>
             <p id="list" a-text="list"></p>
             <p id="none" a-text="none"></p>
             <p id="label" a-text="'total: ' + list.length"></p>
           </div>"#,
    );
    assert_eq!(by_id(&doc, "n").text_content(), "3");
    assert_eq!(by_id(&doc, "list").text_content(), "1,2");
    assert_eq!(by_id(&doc, "none").text_content(), "");
    assert_eq!(by_id(&doc, "label").text_content(), "total: 2");

    let list = app.data(0).unwrap().get("list");
    list.as_array().unwrap().push(Value::from(3));
    assert_eq!(by_id(&doc, "list").text_content(), "1,2,3");
    assert_eq!(by_id(&doc, "label").text_content(), "total: 3");
}

/// A binding that prints a whole list follows pushes, pops and item writes.
#[test]
fn text_of_list_follows_list_changes() {
    let (doc, app) = boot(
        r#"<div a-data="{ list: [1, 2] }">
             <p id="list" a-text="list"></p>
             <p id="label" a-text="'x' + list"></p>
             <button id="set" a-on:click="list[0] = 9"></button>
           </div>"#,
    );
    let list = app.data(0).unwrap().get("list");
    let list = list.as_array().unwrap();

    list.push(Value::from(3));
    assert_eq!(by_id(&doc, "list").text_content(), "1,2,3");
    assert_eq!(by_id(&doc, "label").text_content(), "x1,2,3");

    list.pop();
    assert_eq!(by_id(&doc, "list").text_content(), "1,2");

    by_id(&doc, "set").dispatch("click");
    assert_eq!(by_id(&doc, "list").text_content(), "9,2");
    assert_eq!(by_id(&doc, "label").text_content(), "x9,2");
    assert!(app.runtime().take_errors().is_empty());
}

/// Show toggles inline display.
#[test]
fn show_toggles_display() {
    let (doc, app) = boot(r#"<div a-data="{ open: false }"><p id="p" a-show="open">x</p></div>"#);
    let p = by_id(&doc, "p");
    assert_eq!(p.style("display").as_deref(), Some("none"));
    assert!(p.is_hidden());

    app.data(0).unwrap().set("open", Value::Bool(true));
    assert_eq!(p.style("display").as_deref(), Some("block"));
    assert_eq!(
        p.outer_html(),
        r#"<p id="p" a-show="open" style="display: block">x</p>"#
    );
}

/// Repeat stamps one copy of the template per item and re-renders when the
/// list changes.
#[test]
fn repeat_renders_items() {
    let (doc, app) = boot(
        r#"<div a-data="{ items: ['a', 'b'] }">
             <ul id="list" a-for="item in items"><li a-text="item"></li></ul>
           </div>"#,
    );
    let list = by_id(&doc, "list");
    assert_eq!(list.inner_html(), r#"<li a-text="item">a</li><li a-text="item">b</li>"#);

    let items = app.data(0).unwrap().get("items");
    items.as_array().unwrap().push(Value::from("c"));
    assert_eq!(list.child_count(), 3);
    assert_eq!(list.text_content(), "abc");

    app.data(0)
        .unwrap()
        .set("items", app.runtime().wrap_json(serde_json::json!(["z"])));
    assert_eq!(list.text_content(), "z");
}

/// Item bindings see both the loop variable and the root data, and the loop
/// variable shadows a data property of the same name.
#[test]
fn repeat_scopes_loop_variable() {
    let (doc, _app) = boot(
        r#"<div a-data="{ item: 'shadowed', suffix: '!', todos: [{ title: 'x' }, { title: 'y' }] }">
             <ul id="list" a-for="item in todos"><li a-text="item.title + suffix"></li></ul>
           </div>"#,
    );
    assert_eq!(by_id(&doc, "list").text_content(), "x!y!");
}

/// A non-array source renders nothing and is not an error.
#[test]
fn repeat_over_non_array_renders_nothing() {
    let (doc, app) = boot(
        r#"<div a-data="{ items: null }"><ul id="list" a-for="item in items"><li>x</li></ul></div>"#,
    );
    assert_eq!(by_id(&doc, "list").child_count(), 0);
    assert!(app.runtime().take_errors().is_empty());

    app.data(0)
        .unwrap()
        .set("items", app.runtime().wrap_json(serde_json::json!([1])));
    assert_eq!(by_id(&doc, "list").child_count(), 1);
}

/// A malformed repeat expression is reported and the rest still binds.
#[test]
fn malformed_repeat_is_reported() {
    let (doc, app) = boot(
        r#"<div a-data="{ a: 'ok' }">
             <ul a-for="items"><li a-text="nothing"></li></ul>
             <p id="p" a-text="a"></p>
           </div>"#,
    );
    assert_eq!(by_id(&doc, "p").text_content(), "ok");
    assert_eq!(
        app.runtime().take_errors(),
        vec![Error::from(DirectiveError::MalformedFor {
            expression: "items".into()
        })]
    );
}

/// Event handlers mutate data, and bound regions follow.
#[test]
fn event_updates_data() {
    let (doc, app) = boot(
        r#"<div a-data="{ count: 0 }">
             <button id="b" a-on:click="count++"></button>
             <span id="s" a-text="count"></span>
           </div>"#,
    );
    let button = by_id(&doc, "b");
    button.dispatch("click");
    button.dispatch("click");

    assert_eq!(app.data(0).unwrap().get("count"), Value::from(2));
    assert_eq!(by_id(&doc, "s").text_content(), "2");
}

/// `.prevent` and `.stop` apply before the expression runs, and `$event` is
/// in scope.
#[test]
fn event_modifiers_and_event_binding() {
    let (doc, app) = boot(
        r#"<div a-data="{ outer: 0, kind: '' }" a-on:submit="outer++">
             <form id="f" a-on:submit.prevent.stop="kind = $event.type"></form>
           </div>"#,
    );
    let form = by_id(&doc, "f");
    let event = Event::new("submit");
    let allowed = form.dispatch_event(&event);

    assert!(!allowed);
    assert!(event.default_prevented());
    assert!(event.propagation_stopped());

    let data = app.data(0).unwrap();
    assert_eq!(data.get("kind"), Value::from("submit"));
    assert_eq!(data.get("outer"), Value::from(0));
}

/// Without `.stop` the event bubbles to outer handlers.
#[test]
fn events_bubble_to_outer_handlers() {
    let (doc, app) = boot(
        r#"<div a-data="{ hits: 0 }" a-on:click="hits += 10">
             <button id="b" a-on:click="hits += 1"></button>
           </div>"#,
    );
    by_id(&doc, "b").dispatch("click");
    assert_eq!(app.data(0).unwrap().get("hits"), Value::from(11));
}

/// Handlers inside a repeat see their own item.
#[test]
fn event_handlers_inside_repeat() {
    let (doc, app) = boot(
        r#"<div a-data="{ picked: '', items: ['a', 'b'] }">
             <ul id="list" a-for="item in items"><li a-on:click="picked = item" a-text="item"></li></ul>
           </div>"#,
    );
    let second = by_id(&doc, "list").child_elements()[1].clone();
    second.dispatch("click");
    assert_eq!(app.data(0).unwrap().get("picked"), Value::from("b"));
}

/// Removing items from a handler re-renders the list.
#[test]
fn handler_mutating_list() {
    let (doc, app) = boot(
        r#"<div a-data="{ items: [1, 2, 3] }">
             <button id="pop" a-on:click="items.pop()"></button>
             <ul id="list" a-for="n in items"><li a-text="n"></li></ul>
           </div>"#,
    );
    by_id(&doc, "pop").dispatch("click");
    assert_eq!(by_id(&doc, "list").text_content(), "12");
    assert_eq!(app.data(0).unwrap().get("items").as_array().unwrap().len(), 2);
}

/// One failing binding does not break its neighbours, and a failing handler
/// is reported without aborting dispatch.
#[test]
fn errors_stay_local() {
    let (doc, app) = boot(
        r#"<div a-data="{ a: 1 }">
             <p id="bad" a-text="a.b.c"></p>
             <p id="good" a-text="a"></p>
             <button id="b" a-on:click="missing()"></button>
           </div>"#,
    );
    assert_eq!(by_id(&doc, "good").text_content(), "1");
    assert_eq!(app.runtime().take_errors().len(), 1);

    by_id(&doc, "b").dispatch("click");
    let errors = app.runtime().take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::Eval(_)));

    app.data(0).unwrap().set("a", Value::from(2));
    assert_eq!(by_id(&doc, "good").text_content(), "2");
}

/// A factory declaration is called once to produce the data.
#[test]
fn factory_data_declaration() {
    let (doc, app) = boot(
        r#"<div a-data="() => ({ greeting: 'hello', name: 'world' })">
             <p id="p" a-text="greeting + ', ' + name"></p>
           </div>"#,
    );
    assert_eq!(by_id(&doc, "p").text_content(), "hello, world");
    assert!(app.data(0).unwrap().contains_key(&Key::from("name")));
}

/// Nested roots bind against their own data only.
#[test]
fn nested_roots_are_independent() {
    let (doc, app) = boot(
        r#"<div a-data="{ label: 'outer' }">
             <p id="outer" a-text="label"></p>
             <section a-data="{ label: 'inner' }">
               <p id="inner" a-text="label"></p>
             </section>
           </div>"#,
    );
    assert_eq!(app.roots().len(), 2);
    assert_eq!(by_id(&doc, "outer").text_content(), "outer");
    assert_eq!(by_id(&doc, "inner").text_content(), "inner");

    app.data(0).unwrap().set("label", Value::from("changed"));
    assert_eq!(by_id(&doc, "inner").text_content(), "inner");
}

/// The directive prefix is configurable.
#[test]
fn custom_prefix() {
    let doc = Document::parse(
        r#"<div x-data="{ v: 'x' }" a-data="{ v: 'a' }"><p id="p" x-text="v"></p></div>"#,
    )
    .unwrap();

    let config = Config::from_json(r#"{ "prefix": "x-" }"#).unwrap();
    let mut app = App::with_config(config);
    assert_eq!(app.mount(doc.root()), 1);
    assert_eq!(by_id(&doc, "p").text_content(), "x");
}

/// Handler writes past the array size limit are reported and leave the list
/// as it was.
#[test]
fn oversized_array_writes_are_reported() {
    let (doc, app) = boot(
        r#"<div a-data="{ items: [1] }">
             <button id="index" a-on:click="items[1000000000000000000] = 2"></button>
             <button id="length" a-on:click="items.length = 1000000000000000000"></button>
             <p id="p" a-text="items"></p>
           </div>"#,
    );

    by_id(&doc, "index").dispatch("click");
    let errors = app.runtime().take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::Eval(_)));

    by_id(&doc, "length").dispatch("click");
    let errors = app.runtime().take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::Eval(_)));

    assert_eq!(app.data(0).unwrap().get("items").to_json(), serde_json::json!([1]));
    assert_eq!(by_id(&doc, "p").text_content(), "1");
}
