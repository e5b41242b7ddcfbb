//! Integration tests for the crawl loop against a scripted fixture bot:
//! dedup of same-labeled buttons, heuristic input exploration, loop banning,
//! budget stop, and checkpoint resume.

use std::collections::HashMap;
use std::sync::Arc;

use crawler::{checkpoint, CrawlConfig, Crawler, TerminationReason};
use tbcrawl_core::{screen_signature, Action, CrawlMetadata};
use tbcrawl_telegram::{
    extract_buttons, BareButton, FixtureClient, FixtureScreen, FixtureScript, RemoteMarkup,
    RemoteMessage,
};

fn bare(text: &str, data: &str) -> BareButton {
    BareButton {
        text: text.to_string(),
        data: Some(data.to_string()),
        url: None,
    }
}

fn screen(text: &str, buttons: Vec<Vec<BareButton>>) -> FixtureScreen {
    FixtureScreen {
        text: text.to_string(),
        buttons,
        media_types: vec![],
    }
}

/// Signature the crawler will assign to a fixture screen.
fn fixture_signature(screen: &FixtureScreen) -> String {
    let msg = RemoteMessage {
        text: screen.text.clone(),
        markup: if screen.buttons.is_empty() {
            None
        } else {
            Some(RemoteMarkup::Bare(screen.buttons.clone()))
        },
        media_types: screen.media_types.clone(),
    };
    let extraction = extract_buttons(&msg);
    screen_signature(&msg.text, &extraction.buttons, msg.has_media())
}

/// Menu with two same-labeled "Next" buttons at different columns leading to
/// different screens, plus leaf screens.
fn menu_script() -> FixtureScript {
    let mut screens = HashMap::new();
    screens.insert(
        "main".to_string(),
        screen(
            "Главное меню",
            vec![vec![
                bare("Каталог", "catalog"),
                bare("Next", "page2"),
                bare("Next", "promo"),
            ]],
        ),
    );
    screens.insert("catalog".to_string(), screen("Каталог товаров. Выберите раздел в следующий раз.", vec![]));
    screens.insert("page2".to_string(), screen("Страница 2 из 10. Ничего нового.", vec![]));
    screens.insert("promo".to_string(), screen("Акции недели. Скидок нет.", vec![]));

    let mut transitions = HashMap::new();
    transitions.insert("*|text:/start".to_string(), "main".to_string());
    transitions.insert("main|inline:0:0:catalog".to_string(), "catalog".to_string());
    transitions.insert("main|inline:0:1:page2".to_string(), "page2".to_string());
    transitions.insert("main|inline:0:2:promo".to_string(), "promo".to_string());

    FixtureScript {
        start: "main".to_string(),
        screens,
        transitions,
    }
}

fn config(dir: &std::path::Path) -> CrawlConfig {
    CrawlConfig::new(CrawlMetadata::new("@fixture_bot"), dir)
}

#[tokio::test]
async fn test_same_labeled_buttons_explored_independently() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(menu_script()));
    let mut crawler = Crawler::new(config(dir.path()), client, None).unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.reason, TerminationReason::FrontierEmpty);
    // main + catalog + page2 + promo
    assert_eq!(summary.nodes, 4);
    assert_eq!(summary.edges, 3);

    let raw = std::fs::read_to_string(dir.path().join("bot_map.json")).unwrap();
    let map: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let edges = map["edges"].as_array().unwrap();

    // Both "Next" buttons were followed and reached different screens.
    let next_targets: Vec<&str> = edges
        .iter()
        .filter(|e| e["action"]["button"]["text"] == "Next")
        .map(|e| e["to_node"].as_str().unwrap())
        .collect();
    assert_eq!(next_targets.len(), 2);
    assert_ne!(next_targets[0], next_targets[1]);
}

#[tokio::test]
async fn test_golden_trace_matches_actions_taken() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(menu_script()));
    let mut crawler = Crawler::new(config(dir.path()), client, None).unwrap();

    let summary = crawler.run().await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("golden.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = raw
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len() as u64, summary.actions_taken);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["step"], (i + 1) as u64);
        assert!(line["state_in"]["node_id"].is_string());
        assert!(line["state_out"]["node_id"].is_string());
        assert!(line["user_action"]["key"].is_string());
    }
}

/// Input screen explored with heuristic candidates in pinned order.
fn input_script() -> FixtureScript {
    let mut screens = HashMap::new();
    screens.insert(
        "main".to_string(),
        screen("Главное меню", vec![vec![bare("Найти код", "code")]]),
    );
    screens.insert(
        "ask_code".to_string(),
        screen("Введите 10-значный код ТН ВЭД", vec![]),
    );
    screens.insert("found".to_string(), screen("Код найден. Пошлина оформлена.", vec![]));

    let mut transitions = HashMap::new();
    transitions.insert("*|text:/start".to_string(), "main".to_string());
    transitions.insert("main|inline:0:0:code".to_string(), "ask_code".to_string());
    transitions.insert("ask_code|text:9027901000".to_string(), "found".to_string());

    FixtureScript {
        start: "main".to_string(),
        screens,
        transitions,
    }
}

#[tokio::test]
async fn test_input_screen_tries_heuristic_candidates_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(input_script()));
    let mut crawler = Crawler::new(config(dir.path()), client, None).unwrap();

    crawler.run().await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("golden.jsonl")).unwrap();
    let sent: Vec<String> = raw
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v["user_action"]["action"]["type"] == "send_text")
        .map(|v| v["user_action"]["action"]["value"].as_str().unwrap().to_string())
        .collect();

    // First three candidates of the 10-digit-code rule, in rule order.
    assert_eq!(sent, vec!["9027901000", "6109100000", "4202221000"]);

    // The matching candidate produced an edge to the result screen.
    let map: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("bot_map.json")).unwrap())
            .unwrap();
    let found = map["edges"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["action"]["value"] == "9027901000" && e["to_node"] != e["from_node"]);
    assert!(found);
}

/// A no-op button that always lands back on the same screen.
fn noop_script() -> FixtureScript {
    let mut screens = HashMap::new();
    screens.insert(
        "main".to_string(),
        screen(
            "Меню настроек",
            vec![vec![bare("Обновить", "noop"), bare("Каталог", "catalog")]],
        ),
    );
    screens.insert("catalog".to_string(), screen("Каталог товаров без изменений.", vec![]));

    let mut transitions = HashMap::new();
    transitions.insert("*|text:/start".to_string(), "main".to_string());
    // "noop" has no transition: the bot stays on main.
    transitions.insert("main|inline:0:1:catalog".to_string(), "catalog".to_string());

    FixtureScript {
        start: "main".to_string(),
        screens,
        transitions,
    }
}

#[tokio::test]
async fn test_self_loop_action_gets_banned() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(noop_script()));
    let mut cfg = config(dir.path());
    cfg.loop_repeat_threshold = 1; // ban on the first observed self-loop
    let mut crawler = Crawler::new(cfg, client, None).unwrap();

    crawler.run().await.unwrap();

    let main_id = fixture_signature(&noop_script().screens["main"]);
    let cp = checkpoint::load(dir.path().join("checkpoint.json"))
        .unwrap()
        .unwrap();
    let bans = cp.action_bans.get(&main_id).expect("bans for main");
    assert!(bans.contains("inline:0:0:noop"));
}

#[tokio::test]
async fn test_preseeded_ban_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let main_id = fixture_signature(&noop_script().screens["main"]);

    // Checkpoint carrying only the ban: the crawl must never execute the
    // banned action again.
    let mut cp = tbcrawl_core::CrawlCheckpoint::default();
    cp.action_bans
        .entry(main_id)
        .or_default()
        .insert("inline:0:0:noop".to_string());
    checkpoint::save(dir.path().join("checkpoint.json"), &cp).unwrap();

    let client = Arc::new(FixtureClient::new(noop_script()));
    let mut crawler = Crawler::new(config(dir.path()), client, None).unwrap();
    let summary = crawler.run().await.unwrap();

    // Only the catalog click ran.
    assert_eq!(summary.actions_taken, 1);
    let map: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("bot_map.json")).unwrap())
            .unwrap();
    let noop_edges = map["edges"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["action"]["button"]["data"] == "noop")
        .count();
    assert_eq!(noop_edges, 0);
}

#[tokio::test]
async fn test_action_budget_is_a_hard_stop() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(menu_script()));
    let mut cfg = config(dir.path());
    cfg.metadata.max_actions = 1;
    let mut crawler = Crawler::new(cfg, client, None).unwrap();

    let summary = crawler.run().await.unwrap();
    assert_eq!(summary.reason, TerminationReason::BudgetExceeded);
    assert_eq!(summary.actions_taken, 1);
}

#[tokio::test]
async fn test_resume_continues_without_repeating_work() {
    let dir = tempfile::tempdir().unwrap();

    // First run: stopped by the action budget mid-node.
    {
        let client = Arc::new(FixtureClient::new(menu_script()));
        let mut cfg = config(dir.path());
        cfg.metadata.max_actions = 1;
        let mut crawler = Crawler::new(cfg, client, None).unwrap();
        let summary = crawler.run().await.unwrap();
        assert_eq!(summary.reason, TerminationReason::BudgetExceeded);
    }

    // Second run resumes from the checkpoint and finishes the crawl.
    {
        let client = Arc::new(FixtureClient::new(menu_script()));
        let mut crawler = Crawler::resume(config(dir.path()), client, None).unwrap();
        let summary = crawler.run().await.unwrap();
        assert_eq!(summary.reason, TerminationReason::FrontierEmpty);
        // All three main-menu actions executed exactly once across both runs.
        assert_eq!(summary.actions_taken, 3);
        assert_eq!(summary.nodes, 4);
    }

    let raw = std::fs::read_to_string(dir.path().join("golden.jsonl")).unwrap();
    assert_eq!(raw.lines().count(), 3);
}

#[tokio::test]
async fn test_resume_without_checkpoint_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(menu_script()));
    match Crawler::resume(config(dir.path()), client, None) {
        Ok(_) => panic!("resume without a checkpoint must fail"),
        Err(e) => assert!(matches!(e, tbcrawl_core::CrawlError::Checkpoint(_))),
    }
}

/// menu_script plus a second level below catalog: its entry screen carries one
/// button leading to a deeper leaf.
fn deep_script() -> FixtureScript {
    let mut script = menu_script();
    script.screens.insert(
        "catalog".to_string(),
        screen("Каталог товаров", vec![vec![bare("Подробнее", "deep")]]),
    );
    script.screens.insert(
        "deep".to_string(),
        screen("Карточка товара. Конец ветки.", vec![]),
    );
    script
        .transitions
        .insert("catalog|inline:0:0:deep".to_string(), "deep".to_string());
    script
}

#[tokio::test]
async fn test_resume_at_node_boundary_starts_next_node_from_first_action() {
    let dir = tempfile::tempdir().unwrap();

    // First run: the budget runs out exactly when the root node finishes, so
    // the checkpoint is taken at a node boundary.
    {
        let client = Arc::new(FixtureClient::new(deep_script()));
        let mut cfg = config(dir.path());
        cfg.metadata.max_actions = 3;
        let mut crawler = Crawler::new(cfg, client, None).unwrap();
        let summary = crawler.run().await.unwrap();
        assert_eq!(summary.reason, TerminationReason::BudgetExceeded);
        assert_eq!(summary.actions_taken, 3);
    }

    // The resumed crawl must expand catalog from its first action; a stale
    // action offset from the completed root would skip catalog's only button
    // and lose the subtree below it.
    {
        let client = Arc::new(FixtureClient::new(deep_script()));
        let mut crawler = Crawler::resume(config(dir.path()), client, None).unwrap();
        let summary = crawler.run().await.unwrap();
        assert_eq!(summary.reason, TerminationReason::FrontierEmpty);
        assert_eq!(summary.actions_taken, 4);
        // main + catalog + page2 + promo + deep
        assert_eq!(summary.nodes, 5);
    }
}

#[tokio::test]
async fn test_same_signature_repeats_trigger_backtrack() {
    // Every button is a no-op: the screen signature repeats on each step.
    let mut screens = HashMap::new();
    screens.insert(
        "main".to_string(),
        screen(
            "Панель управления",
            vec![vec![bare("A", "a"), bare("B", "b"), bare("C", "c")]],
        ),
    );
    let mut transitions = HashMap::new();
    transitions.insert("*|text:/start".to_string(), "main".to_string());
    let script = FixtureScript {
        start: "main".to_string(),
        screens,
        transitions,
    };

    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(script));
    let mut cfg = config(dir.path());
    cfg.same_signature_threshold = 1;
    let mut crawler = Crawler::new(cfg, client, None).unwrap();

    let summary = crawler.run().await.unwrap();

    // The second identical signature crosses the threshold: the remaining
    // button is abandoned and the crawl moves on instead of pressing forward.
    assert_eq!(summary.reason, TerminationReason::FrontierEmpty);
    assert_eq!(summary.actions_taken, 2);
    assert_eq!(summary.nodes, 1);
    assert_eq!(summary.edges, 2);
}

#[tokio::test]
async fn test_cancellation_at_step_boundary_keeps_artifacts_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(menu_script()));
    let mut crawler = Crawler::new(config(dir.path()), client, None).unwrap();
    crawler.cancel_handle().store(true, std::sync::atomic::Ordering::Relaxed);

    let summary = crawler.run().await.unwrap();
    assert_eq!(summary.reason, TerminationReason::Cancelled);

    // The checkpoint written at cancellation parses cleanly.
    let cp = checkpoint::load(dir.path().join("checkpoint.json")).unwrap();
    assert!(cp.is_some());
}

#[tokio::test]
async fn test_start_command_example_path_replay() {
    // Paths recorded in the map start from the entry screen; replaying one
    // through the fixture reaches the node it names.
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FixtureClient::new(menu_script()));
    let mut crawler = Crawler::new(config(dir.path()), client, None).unwrap();
    crawler.run().await.unwrap();

    let map: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("bot_map.json")).unwrap())
            .unwrap();
    let catalog_id = fixture_signature(&menu_script().screens["catalog"]);
    let node = &map["nodes"][catalog_id.as_str()];
    let path = node["example_path"].as_array().unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(path[0]["type"], "click");

    use tbcrawl_telegram::RemoteBotClient;
    let replay_client = FixtureClient::new(menu_script());
    let action: Action = serde_json::from_value(path[0].clone()).unwrap();
    let start = Action::SendText {
        value: "/start".to_string(),
    };
    replay_client.send_action(&start).await.unwrap();
    let reached = replay_client.send_action(&action).await.unwrap();
    assert_eq!(reached.text, menu_script().screens["catalog"].text);
}
