//! Integration tests for action-URI dispatch.
//!
//! Every test wires a [`Dispatcher`] to recording fakes and checks the
//! side effects a single URI produces.

#![allow(clippy::unwrap_used)]

mod common;

use common::{Fixture, HostEvent, PageFetcher, test_account};
use serde_json::json;
use structmail_core::BarcodeFormat;
use structmail_mime::LD_JSON;
use structmail_mime::encoding::encode_base64url;

fn b64(text: &str) -> String {
    encode_base64url(text.as_bytes())
}

fn ld_page(objects: &serde_json::Value) -> String {
    format!(
        "<html><head><script type=\"application/ld+json\">{objects}</script></head><body></body></html>"
    )
}

#[tokio::test]
async fn test_invalid_base64_is_a_handled_noop() {
    for uri in [
        "xshareasfile://***?fileName=a.json",
        "xshareascalendar://***",
        "xshareasmail://***",
        "xloadcards:***",
        "xshowsource://***",
        "xshareasfile://",
    ] {
        let mut fixture = Fixture::with_account();
        assert!(fixture.dispatcher.dispatch(uri).await, "{uri}");
        assert_eq!(
            fixture.host.events(),
            vec![HostEvent::Notify("Could not decode action".to_string())],
            "{uri}"
        );
        assert!(fixture.delivery.sent().is_empty());
        assert!(!fixture.temp.path().join("share").exists());
    }
}

#[tokio::test]
async fn test_load_cards_caps_and_skips() {
    let mut fetcher = PageFetcher::default();
    let mut urls = Vec::new();
    for n in 0..7 {
        let url = format!("https://news.example.org/story/{n}");
        fetcher = fetcher.with_page(
            &url,
            &ld_page(&json!([
                {"@type": "Organization", "name": format!("Publisher {n}")},
                {"@type": "NewsArticle", "name": format!("Story {n}")}
            ])),
        );
        urls.push(b64(&url));
    }
    let mut fixture = Fixture::new(Some(test_account()), fetcher);

    assert!(
        fixture
            .dispatcher
            .dispatch(&format!("xloadcards:{}", urls.join(",")))
            .await
    );

    let events = fixture.host.events();
    let [HostEvent::Cards(cards)] = events.as_slice() else {
        panic!("expected one card view, got {events:?}");
    };
    assert_eq!(cards.len(), 5);
    assert!(cards.iter().all(|card| !card.contains("Publisher")));
    assert!(cards[0].contains("Story 0"));
    assert!(cards.iter().all(|card| card.contains("xshareasmail://")));
    assert_eq!(fixture.fetcher.requested().len(), 5);
}

#[tokio::test]
async fn test_load_cards_microdata_fallback_and_failed_fetch() {
    let microdata = r#"<div itemscope itemtype="https://schema.org/Recipe"><span itemprop="name">Pancakes</span></div>"#;
    let fetcher = PageFetcher::default().with_page("https://cooking.example.org/pancakes", microdata);
    let mut fixture = Fixture::new(None, fetcher);

    let uri = format!(
        "xloadcards://{},{}",
        b64("https://missing.example.org/"),
        b64("https://cooking.example.org/pancakes")
    );
    assert!(fixture.dispatcher.dispatch(&uri).await);

    let events = fixture.host.events();
    let cards = events
        .iter()
        .find_map(|event| match event {
            HostEvent::Cards(cards) => Some(cards.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(cards.len(), 1);
    assert!(cards[0].contains("Pancakes"));
}

#[tokio::test]
async fn test_load_cards_without_data_shows_nothing() {
    let fetcher = PageFetcher::default().with_page("https://plain.example.org/", "<p>hi</p>");
    let mut fixture = Fixture::new(None, fetcher);
    let uri = format!("xloadcards:{}", b64("https://plain.example.org/"));

    assert!(fixture.dispatcher.dispatch(&uri).await);
    assert!(fixture.host.events().is_empty());
}

#[tokio::test]
async fn test_mailto_approve_sends_reply() {
    let mut fixture = Fixture::with_account();

    assert!(
        fixture
            .dispatcher
            .dispatch("mailto:shop%40example.org?action=ConfirmAction")
            .await
    );

    let sent = fixture.delivery.sent();
    assert_eq!(sent.len(), 1);
    let (account, message, description) = &sent[0];
    assert_eq!(account, "acc-1");
    assert_eq!(description, "ConfirmAction");
    assert_eq!(message.to(), Some("shop@example.org"));
    assert_eq!(message.subject(), Some("ConfirmAction"));
    assert!(message.from().unwrap().contains("alice@example.org"));

    let reply: serde_json::Value =
        serde_json::from_str(&message.text_of_type(LD_JSON).unwrap()).unwrap();
    assert_eq!(reply["@type"], "ConfirmAction");
    assert_eq!(reply["name"], "Approved");

    assert_eq!(
        fixture.host.events(),
        vec![HostEvent::Notify("Sent ConfirmAction".to_string())]
    );
}

#[tokio::test]
async fn test_mailto_recipient_cannot_inject_headers() {
    let mut fixture = Fixture::with_account();

    assert!(
        fixture
            .dispatcher
            .dispatch(
                "mailto:victim%40example.org%0D%0ABcc:%20evil%40attacker.org?action=ConfirmAction"
            )
            .await
    );
    assert!(
        fixture
            .dispatcher
            .dispatch("mailto:a%40example.org,b%40example.org?action=CancelAction")
            .await
    );

    assert!(fixture.delivery.sent().is_empty());
    assert_eq!(
        fixture.host.events(),
        vec![
            HostEvent::Notify("Could not decode action".to_string()),
            HostEvent::Notify("Could not decode action".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_mailto_deny_without_account_starts_setup() {
    let mut fixture = Fixture::without_account();
    assert!(
        fixture
            .dispatcher
            .dispatch("mailto:shop@example.org?action=CancelAction")
            .await
    );
    assert!(fixture.delivery.sent().is_empty());
    assert_eq!(fixture.host.events(), vec![HostEvent::AccountSetup]);
}

#[tokio::test]
async fn test_mailto_unknown_action_and_plain_link() {
    let mut fixture = Fixture::with_account();

    assert!(
        fixture
            .dispatcher
            .dispatch("mailto:shop@example.org?action=DeleteAction")
            .await
    );
    assert!(fixture.host.events().is_empty());
    assert!(fixture.delivery.sent().is_empty());

    assert!(
        fixture
            .dispatcher
            .dispatch("mailto:friend@example.org")
            .await
    );
    assert_eq!(
        fixture.host.events(),
        vec![HostEvent::OpenUrl("mailto:friend@example.org".to_string())]
    );
}

#[tokio::test]
async fn test_share_as_file_writes_named_file() {
    let mut fixture = Fixture::with_account();
    let json = r#"{"@type":"Recipe","name":"Soup"}"#;

    let uri = format!("xshareasfile://{}?fileName=Soup%20Recipe.json", b64(json));
    assert!(fixture.dispatcher.dispatch(&uri).await);

    let path = fixture.temp.path().join("share").join("Soup Recipe.json");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), json);
    assert_eq!(
        fixture.host.events(),
        vec![HostEvent::Share(path, LD_JSON.to_string())]
    );
}

#[tokio::test]
async fn test_share_as_file_default_and_sanitized_names() {
    let mut fixture = Fixture::with_account();
    let json = r#"{"@type":"FlightReservation"}"#;

    assert!(
        fixture
            .dispatcher
            .dispatch(&format!("xshareasfile://{}", b64(json)))
            .await
    );
    assert!(
        fixture
            .dispatcher
            .dispatch(&format!(
                "xshareasfile://{}?fileName=..%2F..%2Fescape.json",
                b64(json)
            ))
            .await
    );

    let share = fixture.temp.path().join("share");
    assert!(share.join("sml.json").exists());
    assert!(share.join("escape.json").exists());
    assert!(!fixture.temp.path().join("escape.json").exists());
}

#[tokio::test]
async fn test_share_as_calendar_without_start_date() {
    let mut fixture = Fixture::with_account();
    let event = json!({"@type": "Event", "name": "Launch", "startDate": "whenever"});

    let uri = format!("xshareascalendar://{}", b64(&event.to_string()));
    assert!(fixture.dispatcher.dispatch(&uri).await);

    let events = fixture.host.events();
    let [HostEvent::OpenFile(path, mime)] = events.as_slice() else {
        panic!("expected calendar file, got {events:?}");
    };
    assert_eq!(mime, "text/calendar");
    assert_eq!(path.extension().unwrap(), "ics");

    let ics = std::fs::read_to_string(path).unwrap();
    assert!(ics.contains("BEGIN:VEVENT\r\n"));
    assert!(ics.contains("SUMMARY:Launch\r\n"));
    assert!(!ics.contains("DTSTART"));
}

#[tokio::test]
async fn test_share_as_mail() {
    let payload = r#"{"@type":"Event","name":"Gig"}"#;

    let mut fixture = Fixture::with_account();
    assert!(
        fixture
            .dispatcher
            .dispatch(&format!("xshareasmail://{}", b64(payload)))
            .await
    );
    assert_eq!(
        fixture.host.events(),
        vec![HostEvent::Compose("acc-1".to_string(), payload.to_string())]
    );

    let mut fixture = Fixture::without_account();
    assert!(
        fixture
            .dispatcher
            .dispatch(&format!("xshareasmail://{}", b64(payload)))
            .await
    );
    assert_eq!(fixture.host.events(), vec![HostEvent::AccountSetup]);
}

#[tokio::test]
async fn test_cid_is_not_intercepted() {
    let mut fixture = Fixture::with_account();
    assert!(!fixture.dispatcher.dispatch("cid:logo@example.org").await);
    assert!(fixture.host.events().is_empty());

    let attachment = fixture.dispatcher.resolve_cid("cid:logo@example.org").unwrap();
    assert_eq!(attachment.mime_type, "image/png");
    assert!(fixture.dispatcher.resolve_cid("cid:other@example.org").is_none());
    assert!(fixture.dispatcher.resolve_cid("https://example.org").is_none());
}

#[tokio::test]
async fn test_clipboard_and_legacy_file_links() {
    let mut fixture = Fixture::with_account();

    assert!(fixture.dispatcher.dispatch("xclipboard:ABC%20123").await);
    assert!(fixture.dispatcher.dispatch("file:///tmp/ticket.pdf").await);

    assert_eq!(
        fixture.clipboard.entries(),
        vec![
            ("Copied ABC 123".to_string(), "ABC 123".to_string()),
            (
                "Copied file:///tmp/ticket.pdf".to_string(),
                "file:///tmp/ticket.pdf".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_reload_renders_fetched_document() {
    let fetcher = PageFetcher::default().with_page(
        "https://live.example.org/status.json",
        r#"[{"@type":"FlightStatus","name":"LH 400 boarding"},{"@type":"Thing"}]"#,
    );
    let mut fixture = Fixture::new(None, fetcher);

    assert!(
        fixture
            .dispatcher
            .dispatch("xreload://live.example.org/status.json")
            .await
    );

    assert_eq!(
        fixture.fetcher.requested(),
        vec!["https://live.example.org/status.json"]
    );
    let events = fixture.host.events();
    let [HostEvent::Cards(cards)] = events.as_slice() else {
        panic!("expected cards, got {events:?}");
    };
    assert_eq!(cards.len(), 2);
    assert!(cards[0].contains("LH 400 boarding"));
    assert!(!cards[0].contains("mdc-card__actions"));
}

#[tokio::test]
async fn test_reload_failure_notifies() {
    let mut fixture = Fixture::without_account();
    assert!(
        fixture
            .dispatcher
            .dispatch("xreload://gone.example.org/x.json")
            .await
    );
    assert_eq!(
        fixture.host.events(),
        vec![HostEvent::Notify(
            "Got no content (server returned status 404)".to_string()
        )]
    );
}

#[tokio::test]
async fn test_reload_without_data_shows_nothing() {
    let fetcher =
        PageFetcher::default().with_page("https://live.example.org/empty.json", "not json at all");
    let mut fixture = Fixture::new(None, fetcher);

    assert!(
        fixture
            .dispatcher
            .dispatch("xreload://live.example.org/empty.json")
            .await
    );
    assert_eq!(
        fixture.fetcher.requested(),
        vec!["https://live.example.org/empty.json"]
    );
    assert!(fixture.host.events().is_empty());
}

#[tokio::test]
async fn test_request_fetches_https_form() {
    let fetcher = PageFetcher::default().with_page("https://example.org/ping?id=7", "ok");
    let mut fixture = Fixture::new(None, fetcher);

    assert!(fixture.dispatcher.dispatch("xrequest://example.org/ping?id=7").await);
    assert_eq!(fixture.fetcher.requested(), vec!["https://example.org/ping?id=7"]);
    assert!(fixture.host.events().is_empty());
}

#[tokio::test]
async fn test_view_actions() {
    let mut fixture = Fixture::with_account();
    let sources = format!("{},{}", b64("{\"first\":1}"), b64("{\"second\":2}"));

    assert!(fixture.dispatcher.dispatch("xbarcode:/demo").await);
    assert!(
        fixture
            .dispatcher
            .dispatch(&format!("xshowsource://{sources}"))
            .await
    );
    assert!(fixture.dispatcher.dispatch("xjs:run").await);
    assert!(fixture.dispatcher.dispatch("xalert:hello").await);
    assert!(fixture.dispatcher.dispatch("https://example.org/page").await);

    assert_eq!(
        fixture.host.events(),
        vec![
            HostEvent::Image(BarcodeFormat::Pdf417, 600, 400),
            HostEvent::Source("{\"first\":1}".to_string()),
            HostEvent::Script("(function() { return 'this'; })();".to_string()),
            HostEvent::Alert("[object Window]".to_string()),
            HostEvent::Alert("xalert:hello".to_string()),
            HostEvent::OpenUrl("https://example.org/page".to_string()),
        ]
    );
}
