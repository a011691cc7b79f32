use rawtalk_core::db::{open_db, open_db_in_memory};
use rawtalk_core::{
    OpinionListQuery, OpinionService, OpinionServiceError, SqliteOpinionRepository,
    SqliteUserRepository, UserId, UserService, ValidationError, VoteDirection, VoteOutcome,
};
use rusqlite::Connection;
use std::path::Path;
use std::thread;
use uuid::Uuid;

fn register(conn: &Connection, first_name: &str) -> UserId {
    let users = UserService::new(SqliteUserRepository::try_new(conn).unwrap());
    let email = format!("{}@rawtalk.test", first_name.to_lowercase());
    users.register_user(first_name, None, &email).unwrap().uuid
}

fn opinions(conn: &Connection) -> OpinionService<SqliteOpinionRepository<'_>> {
    OpinionService::new(SqliteOpinionRepository::try_new(conn).unwrap())
}

#[test]
fn create_opinion_reads_back_neutral_state() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let service = opinions(&conn);

    let opinion = service.create_opinion(author, "  cats > dogs ").unwrap();
    assert_eq!(opinion.content(), "cats > dogs");
    assert_eq!(opinion.author(), author);
    assert_eq!(opinion.score(), 0);
    assert!(!opinion.is_less_popular());
}

#[test]
fn create_opinion_rejects_overlong_content() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let service = opinions(&conn);

    let err = service
        .create_opinion(author, &"y".repeat(501))
        .unwrap_err();
    assert!(matches!(
        err,
        OpinionServiceError::Validation(ValidationError::TextTooLong { .. })
    ));
}

#[test]
fn create_opinion_for_unknown_author_fails() {
    let conn = open_db_in_memory().unwrap();
    let service = opinions(&conn);

    let err = service.create_opinion(Uuid::new_v4(), "who am i").unwrap_err();
    assert!(matches!(err, OpinionServiceError::UnknownUser(_)));
}

#[test]
fn cast_vote_reports_outcomes_and_stays_exclusive() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let voter = register(&conn, "Bob");
    let service = opinions(&conn);
    let id = service.create_opinion(author, "vote here").unwrap().uuid();

    let (opinion, outcome) = service.cast_vote(id, voter, VoteDirection::Up).unwrap();
    assert_eq!(outcome, VoteOutcome::Cast);
    assert_eq!(opinion.score(), 1);

    let (opinion, outcome) = service.cast_vote(id, voter, VoteDirection::Up).unwrap();
    assert_eq!(outcome, VoteOutcome::Unchanged);
    assert_eq!(opinion.score(), 1);

    let (opinion, outcome) = service.cast_vote(id, voter, VoteDirection::Down).unwrap();
    assert_eq!(outcome, VoteOutcome::Switched);
    assert_eq!(opinion.score(), -1);
    assert_eq!(opinion.upvoters().count(), 0);
    assert_eq!(opinion.downvoters().collect::<Vec<_>>(), vec![voter]);

    assert_eq!(service.get_opinion(id).unwrap(), opinion);
}

#[test]
fn retract_vote_restores_score_and_tolerates_non_voters() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let voter = register(&conn, "Bob");
    let bystander = register(&conn, "Cy");
    let service = opinions(&conn);
    let id = service.create_opinion(author, "retractable").unwrap().uuid();

    service.cast_vote(id, voter, VoteDirection::Down).unwrap();
    let (opinion, retracted) = service.retract_vote(id, voter).unwrap();
    assert_eq!(retracted, Some(VoteDirection::Down));
    assert_eq!(opinion.score(), 0);

    let (opinion, retracted) = service.retract_vote(id, bystander).unwrap();
    assert_eq!(retracted, None);
    assert_eq!(opinion.score(), 0);
}

#[test]
fn vote_on_missing_opinion_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let voter = register(&conn, "Bob");
    let service = opinions(&conn);
    let missing = Uuid::new_v4();

    let err = service
        .cast_vote(missing, voter, VoteDirection::Up)
        .unwrap_err();
    assert!(matches!(err, OpinionServiceError::OpinionNotFound(id) if id == missing));
}

#[test]
fn nil_voter_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let service = opinions(&conn);
    let id = service.create_opinion(author, "nil check").unwrap().uuid();

    let err = service
        .cast_vote(id, Uuid::nil(), VoteDirection::Up)
        .unwrap_err();
    assert!(matches!(
        err,
        OpinionServiceError::Validation(ValidationError::NilId { field: "voter" })
    ));
}

#[test]
fn less_popular_opinions_leave_the_feed_and_return() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let service = opinions(&conn);
    let id = service.create_opinion(author, "controversial").unwrap().uuid();

    let voters: Vec<UserId> = (0..500)
        .map(|index| register(&conn, &format!("Voter{index}")))
        .collect();
    for voter in &voters {
        service.cast_vote(id, *voter, VoteDirection::Down).unwrap();
    }

    let opinion = service.get_opinion(id).unwrap();
    assert_eq!(opinion.score(), -500);
    assert!(opinion.is_less_popular());
    assert!(service
        .list_feed(&OpinionListQuery::default())
        .unwrap()
        .is_empty());

    let (opinion, _) = service.retract_vote(id, voters[0]).unwrap();
    assert_eq!(opinion.score(), -499);
    assert!(!opinion.is_less_popular());
    assert_eq!(
        service.list_feed(&OpinionListQuery::default()).unwrap().len(),
        1
    );
}

#[test]
fn only_the_author_may_edit_or_delete() {
    let conn = open_db_in_memory().unwrap();
    let author = register(&conn, "Ada");
    let other = register(&conn, "Bob");
    let service = opinions(&conn);
    let id = service.create_opinion(author, "mine").unwrap().uuid();
    service.cast_vote(id, other, VoteDirection::Up).unwrap();

    let err = service.edit_opinion(other, id, "hijacked").unwrap_err();
    assert!(matches!(err, OpinionServiceError::NotAuthor { actor, .. } if actor == other));
    let err = service.delete_opinion(other, id).unwrap_err();
    assert!(matches!(err, OpinionServiceError::NotAuthor { .. }));

    let edited = service.edit_opinion(author, id, "still mine").unwrap();
    assert_eq!(edited.content(), "still mine");
    assert_eq!(edited.score(), 1);

    service.delete_opinion(author, id).unwrap();
    assert!(matches!(
        service.get_opinion(id),
        Err(OpinionServiceError::OpinionNotFound(_))
    ));
}

#[test]
fn concurrent_voters_on_separate_connections_are_serialized() {
    const THREADS: usize = 4;
    const VOTES_PER_THREAD: usize = 25;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("votes.db");

    let conn = open_db(&path).unwrap();
    let author = register(&conn, "Ada");
    let id = opinions(&conn).create_opinion(author, "popular").unwrap().uuid();
    let voter_groups: Vec<Vec<UserId>> = (0..THREADS)
        .map(|thread_index| {
            (0..VOTES_PER_THREAD)
                .map(|index| register(&conn, &format!("Voter{thread_index}x{index}")))
                .collect()
        })
        .collect();

    let handles: Vec<_> = voter_groups
        .into_iter()
        .map(|voters| {
            let path = path.clone();
            thread::spawn(move || cast_all(&path, id, &voters))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let opinion = opinions(&conn).get_opinion(id).unwrap();
    assert_eq!(opinion.score(), (THREADS * VOTES_PER_THREAD) as i64);
    assert_eq!(opinion.votes().upvote_count(), THREADS * VOTES_PER_THREAD);
}

fn cast_all(path: &Path, id: Uuid, voters: &[UserId]) {
    let conn = open_db(path).unwrap();
    let service = opinions(&conn);
    for voter in voters {
        service.cast_vote(id, *voter, VoteDirection::Up).unwrap();
    }
}
