mod common;

use common::{date, days_off, iteration, range, team_context, MockCapacityService, MockStore};
use std::sync::Arc;
use team_calendar::components::capacity::{resolve_team_name, CapacityService};
use team_calendar::components::models::EventDisplay;
use team_calendar::components::store::{keys, StoreScope};
use team_calendar::components::CapacityEventsHandle;
use team_calendar::startup::select_team;
use team_calendar::utils::color::DAYS_OFF_CATEGORY;
use team_calendar::utils::time::{month_grid_range, DateRange, MonthAndYear};

fn march_grid() -> DateRange {
    month_grid_range(MonthAndYear::new(2024, 3).unwrap(), chrono::Weekday::Mon)
}

async fn sprint_service() -> Arc<MockCapacityService> {
    let service = Arc::new(MockCapacityService::new());
    service
        .add_iteration(
            iteration("it-1", "Sprint 1", date(2024, 3, 4), date(2024, 3, 15)),
            vec![
                days_off("alice", "Alice", date(2024, 3, 4), date(2024, 3, 5)),
                days_off("bob", "Bob", date(2024, 3, 5), date(2024, 3, 5)),
            ],
        )
        .await;
    service
}

fn bound_handle(service: &Arc<MockCapacityService>) -> CapacityEventsHandle {
    let shared: Arc<dyn CapacityService> = Arc::clone(service) as Arc<dyn CapacityService>;
    let handle = CapacityEventsHandle::new(shared, 14);
    handle.initialize(team_context("team-1"));
    handle
}

/// Overlapping days off collapse into one event per date
#[tokio::test]
async fn test_days_off_grouping() {
    let service = sprint_service().await;
    let handle = bound_handle(&service);

    let report = handle.preload_iterations(march_grid()).await;
    assert_eq!(report.iterations_fetched, 1);
    assert_eq!(report.capacity_fetched, 1);
    assert!(report.failed_iterations.is_empty());

    let events = handle.get_events(&range(date(2024, 3, 4), date(2024, 3, 6)));

    let sprint = events.iter().find(|event| event.id == "iteration.it-1").unwrap();
    assert_eq!(sprint.display, EventDisplay::Background);
    assert_eq!(sprint.end_date, date(2024, 3, 16));

    let fourth = events.iter().find(|event| event.id == "daysoff.2024-03-04").unwrap();
    assert_eq!(fourth.title, "Alice");
    assert_eq!(fourth.category, DAYS_OFF_CATEGORY);

    let fifth = events.iter().find(|event| event.id == "daysoff.2024-03-05").unwrap();
    assert_eq!(fifth.title, "Alice, Bob");
    assert_eq!(fifth.start_date, date(2024, 3, 5));
    assert_eq!(fifth.end_date, date(2024, 3, 6));
    let linked: Vec<&str> = fifth.icons.iter().map(|icon| icon.linked_event_id.as_str()).collect();
    assert_eq!(linked, vec!["daysoff.2024-03-04.alice", "daysoff.2024-03-05.bob"]);

    assert!(events.iter().all(|event| event.id != "daysoff.2024-03-06"));

    let group = handle.get_grouped_event_for_date(date(2024, 3, 5)).unwrap();
    assert_eq!(group.members.len(), 2);

    let bob = handle.get_capacity_record("daysoff.2024-03-05.bob").unwrap();
    assert_eq!(bob.member_display_name, "Bob");
    assert!(handle.get_capacity_record("daysoff.2024-03-05.carol").is_none());
}

#[tokio::test]
async fn test_second_preload_uses_cache() {
    let service = sprint_service().await;
    let handle = bound_handle(&service);

    handle.preload_iterations(march_grid()).await;
    let first = handle.get_events(&march_grid());

    let report = handle.preload_iterations(march_grid()).await;
    assert_eq!(report.iterations_fetched, 0);
    assert_eq!(report.capacity_fetched, 0);

    assert_eq!(handle.get_events(&march_grid()), first);
    assert_eq!(service.iteration_calls(), 1);
    assert_eq!(service.capacity_calls_for("it-1").await, 1);
}

#[tokio::test]
async fn test_padding_reaches_neighbouring_iterations() {
    let service = sprint_service().await;
    service
        .add_iteration(iteration("it-0", "Sprint 0", date(2024, 2, 12), date(2024, 2, 23)), Vec::new())
        .await;
    let handle = bound_handle(&service);

    let visible = range(date(2024, 3, 1), date(2024, 3, 31));
    handle.preload_iterations(visible).await;

    let names: Vec<String> = handle.get_iterations().into_iter().map(|it| it.name).collect();
    assert!(names.contains(&"Sprint 0".to_string()));
    assert!(handle.get_events(&visible).iter().all(|event| event.id != "iteration.it-0"));
}

/// Iterations whose capacity failed are skipped until the team is rebound
#[tokio::test]
async fn test_failed_capacity_not_retried() {
    let service = sprint_service().await;
    service
        .add_iteration(
            iteration("it-2", "Sprint 2", date(2024, 3, 18), date(2024, 3, 29)),
            vec![days_off("carol", "Carol", date(2024, 3, 20), date(2024, 3, 20))],
        )
        .await;
    service.fail_capacity("it-2").await;
    let handle = bound_handle(&service);

    let report = handle.preload_iterations(march_grid()).await;
    assert_eq!(report.capacity_fetched, 1);
    assert_eq!(report.failed_iterations, vec!["it-2".to_string()]);
    assert!(handle.get_grouped_event_for_date(date(2024, 3, 20)).is_none());

    service.clear_capacity_failures().await;
    handle.preload_iterations(march_grid()).await;
    assert_eq!(service.capacity_calls_for("it-2").await, 1);

    handle.initialize(team_context("team-1"));
    handle.preload_iterations(march_grid()).await;
    assert_eq!(service.capacity_calls_for("it-2").await, 2);
    assert!(handle.get_grouped_event_for_date(date(2024, 3, 20)).is_some());
}

#[tokio::test]
async fn test_iteration_failure_is_retried() {
    let service = sprint_service().await;
    service.fail_iterations(true);
    let handle = bound_handle(&service);

    let report = handle.preload_iterations(march_grid()).await;
    assert!(report.iterations_failed);
    assert!(handle.get_events(&march_grid()).is_empty());

    service.fail_iterations(false);
    let report = handle.preload_iterations(march_grid()).await;
    assert!(!report.iterations_failed);
    assert_eq!(report.iterations_fetched, 1);
    assert_eq!(service.iteration_calls(), 2);
}

/// A preload issued for the previous team is dropped
#[tokio::test]
async fn test_team_switch_discards_preload() {
    let service = sprint_service().await;
    let gate = service.gate_iterations("team-1").await;
    let handle = bound_handle(&service);

    let preloading = handle.clone();
    let task = tokio::spawn(async move { preloading.preload_iterations(march_grid()).await });

    while service.iteration_calls() == 0 {
        tokio::task::yield_now().await;
    }
    handle.initialize(team_context("team-2"));
    gate.notify_one();

    let report = task.await.unwrap();
    assert!(report.discarded);
    assert!(handle.get_events(&march_grid()).is_empty());
    assert!(handle.get_iterations().is_empty());
    assert_eq!(handle.team_context().map(|ctx| ctx.team_id), Some("team-2".to_string()));
}

/// The newer team's preload wins however late the older one finishes
#[tokio::test]
async fn test_team_switch_keeps_only_new_team_data() {
    let service = sprint_service().await;
    service
        .add_team_iteration(
            "team-2",
            iteration("it-20", "Platform Sprint", date(2024, 3, 4), date(2024, 3, 15)),
            vec![days_off("carol", "Carol", date(2024, 3, 5), date(2024, 3, 5))],
        )
        .await;
    let gate = service.gate_iterations("team-1").await;
    let handle = bound_handle(&service);

    let preloading = handle.clone();
    let stale = tokio::spawn(async move { preloading.preload_iterations(march_grid()).await });
    while service.iteration_calls() == 0 {
        tokio::task::yield_now().await;
    }

    handle.initialize(team_context("team-2"));
    let report = handle.preload_iterations(march_grid()).await;
    assert!(!report.discarded);
    assert_eq!(report.iterations_fetched, 1);

    gate.notify_one();
    assert!(stale.await.unwrap().discarded);

    let names: Vec<String> = handle.get_iterations().into_iter().map(|it| it.name).collect();
    assert_eq!(names, vec!["Platform Sprint".to_string()]);

    let group = handle.get_grouped_event_for_date(date(2024, 3, 5)).unwrap();
    let members: Vec<&str> = group.members.iter().map(|m| m.member_display_name.as_str()).collect();
    assert_eq!(members, vec!["Carol"]);
    assert!(handle.get_grouped_event_for_date(date(2024, 3, 4)).is_none());

    let titles: Vec<String> = handle
        .get_events(&march_grid())
        .into_iter()
        .map(|event| event.title)
        .collect();
    assert_eq!(titles, vec!["Platform Sprint".to_string(), "Carol".to_string()]);
    assert_eq!(service.capacity_calls_for("it-1").await, 0);
}

#[tokio::test]
async fn test_summaries_and_links() {
    let service = sprint_service().await;
    let handle = bound_handle(&service);
    let iterations = handle.get_iteration_summary_data();
    let capacity = handle.get_capacity_summary_data();

    handle.preload_iterations(march_grid()).await;

    let iteration_rows = iterations.borrow().clone();
    assert_eq!(iteration_rows.len(), 1);
    assert_eq!(iteration_rows[0].title, "Sprint 1");
    assert_eq!(iteration_rows[0].sub_title, "03/04/2024 - 03/15/2024");
    assert!(iteration_rows[0]
        .url
        .as_deref()
        .unwrap()
        .ends_with("/_sprints/taskboard/Team%20team-1/Fabrikam/Sprint%201"));

    let capacity_rows = capacity.borrow().clone();
    let names: Vec<&str> = capacity_rows.iter().map(|row| row.title.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
    assert_eq!(capacity_rows[0].image_url.as_deref(), Some("https://avatars.example/alice"));

    assert_eq!(
        handle.get_capacity_url().borrow().as_str(),
        "https://dev.azure.com/contoso/Fabrikam/_sprints/capacity/Team%20team-1"
    );

    handle.set_team_name("Platform");
    assert!(handle.get_iteration_url().borrow().ends_with("/_sprints/taskboard/Platform"));
}

#[tokio::test]
async fn test_initialize_resets_published_state() {
    let service = sprint_service().await;
    let handle = bound_handle(&service);
    let capacity = handle.get_capacity_summary_data();

    handle.preload_iterations(march_grid()).await;
    assert!(!capacity.borrow().is_empty());

    handle.initialize(team_context("team-2"));
    assert!(capacity.borrow().is_empty());
    assert!(handle.get_events(&march_grid()).is_empty());
}

#[tokio::test]
async fn test_team_name_falls_back_to_last_known() {
    let service = MockCapacityService::new();
    service.add_team("team-1", "Platform").await;

    assert_eq!(resolve_team_name(&service, "project-1", "team-1", "Old name").await, "Platform");
    assert_eq!(resolve_team_name(&service, "project-1", "gone", "Old name").await, "Old name");
}

#[tokio::test]
async fn test_team_selection() {
    let store = MockStore::new();
    let service = MockCapacityService::new();
    service.add_team("t-beta", "beta").await;
    service.add_team("t-alpha", "Alpha").await;

    // First team by case-insensitive name when nothing is remembered
    let team = select_team(&store, &service, "project-1", None).await.unwrap();
    assert_eq!(team.id, "t-alpha");

    let remembered = store
        .raw(&keys::selected_team("project-1"), StoreScope::User)
        .await
        .unwrap();
    assert_eq!(remembered, "\"t-alpha\"");

    // Explicit request wins and is remembered
    let team = select_team(&store, &service, "project-1", Some("t-beta")).await.unwrap();
    assert_eq!(team.id, "t-beta");
    let team = select_team(&store, &service, "project-1", None).await.unwrap();
    assert_eq!(team.id, "t-beta");

    // Unknown ids fall back to the first team
    let team = select_team(&store, &service, "project-1", Some("missing")).await.unwrap();
    assert_eq!(team.id, "t-alpha");
}

#[tokio::test]
async fn test_team_selection_without_teams() {
    let store = MockStore::new();
    let service = MockCapacityService::new();
    assert!(select_team(&store, &service, "project-1", None).await.is_err());
}
