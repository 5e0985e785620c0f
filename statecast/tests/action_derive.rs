//! Tests for #[derive(Action)]

#![allow(dead_code)]

use std::any::TypeId;

use statecast::{Action, Outcome};

#[derive(Action, Clone, Debug, PartialEq)]
enum Plain {
    Unit,
    Tuple(u8, u8),
    Struct { id: u32 },
}

#[test]
fn test_name_covers_every_variant_shape() {
    assert_eq!(Plain::Unit.name(), "Unit");
    assert_eq!(Plain::Tuple(1, 2).name(), "Tuple");
    assert_eq!(Plain::Struct { id: 7 }.name(), "Struct");
}

#[test]
fn test_companions_default_to_unit() {
    assert_eq!(TypeId::of::<<Plain as Action>::Success>(), TypeId::of::<()>());
    assert_eq!(TypeId::of::<<Plain as Action>::Failure>(), TypeId::of::<()>());
}

#[derive(Clone, Debug, PartialEq)]
struct FetchError {
    code: u16,
}

#[derive(Action, Clone, Debug, PartialEq)]
#[action(success = "Vec<String>", failure = "FetchError")]
enum Fetch {
    Load { page: u32 },
    #[action(rename = "Reload")]
    Refresh,
}

#[test]
fn test_declared_companions() {
    assert_eq!(
        TypeId::of::<<Fetch as Action>::Success>(),
        TypeId::of::<Vec<String>>()
    );
    assert_eq!(
        TypeId::of::<<Fetch as Action>::Failure>(),
        TypeId::of::<FetchError>()
    );

    let failed: Outcome<<Fetch as Action>::Success, <Fetch as Action>::Failure> =
        Err(FetchError { code: 404 }).into();
    assert_eq!(failed.failure(), Some(&FetchError { code: 404 }));
}

#[test]
fn test_rename_and_summary() {
    assert_eq!(Fetch::Load { page: 2 }.name(), "Load");
    assert_eq!(Fetch::Refresh.name(), "Reload");
    // summary falls back to Debug
    assert_eq!(Fetch::Load { page: 2 }.summary(), "Load { page: 2 }");
}

#[tokio::test]
async fn test_store_accepts_matching_closure_reducer() {
    #[derive(Clone, Debug, PartialEq, Default)]
    struct Pages {
        last: Option<Outcome<Vec<String>, FetchError>>,
    }

    let store = statecast::Store::new(Pages::default(), |_: &Pages, action: &Fetch| Pages {
        last: Some(match action {
            Fetch::Load { page } => Outcome::Succeeded(vec![format!("page {page}")]),
            Fetch::Refresh => Outcome::Failed(FetchError { code: 503 }),
        }),
    })
    .unwrap();

    store.dispatch_action("list", Fetch::Refresh).unwrap();
    store.settled().await;
    let state = store.current_state();
    assert!(state.last.as_ref().is_some_and(Outcome::is_failure));
}
