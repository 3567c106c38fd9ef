mod common;

use common::{Harness, Note};
use proptest::prelude::*;
use tally_cqrs::{Aggregate, CommandRepository, UnitOfWork};
use tally_domain::context::{CorrelationId, RequestContext, RequestId};
use tally_domain::error::{Classify, ErrorKind};

fn ctx(request: &str) -> RequestContext {
    RequestContext::new(RequestId::new(request), CorrelationId::new("law"), "/law", true)
}

async fn bump(h: &Harness, id: &str, round: usize) {
    let mut tx = h.uow.begin(&ctx(&format!("bump-{round}"))).await.unwrap();
    let mut note: Note = h.repo.find_by_id(&tx, id).await.unwrap().unwrap();
    note.text = format!("round {round}");
    h.repo.update(&mut tx, &mut note).await.unwrap();
    h.uow.commit(&mut tx).await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Two writers that both read version `v`: one lands at `v + 1`, the other gets `Conflict`,
    /// whether the loser stages while the winner is still open or after it committed.
    #[test]
    fn one_of_two_stale_writers_wins(prior in 0usize..4, loser_waits_for_commit in any::<bool>()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let h = Harness::new();
            let id = h.seed("u1", "start").await.meta.id;
            for round in 0..prior {
                bump(&h, &id, round).await;
            }
            let v = h.db.get(Note::TABLE, &id).unwrap().version;

            let mut first = h.uow.begin(&ctx("first")).await.unwrap();
            let mut second = h.uow.begin(&ctx("second")).await.unwrap();
            let mut a: Note = h.repo.find_by_id(&first, &id).await.unwrap().unwrap();
            let mut b: Note = h.repo.find_by_id(&second, &id).await.unwrap().unwrap();
            assert_eq!((a.meta.version, b.meta.version), (v, v));

            a.text = "first".into();
            b.text = "second".into();
            h.repo.update(&mut first, &mut a).await.unwrap();
            if loser_waits_for_commit {
                h.uow.commit(&mut first).await.unwrap();
            }

            let err = h.repo.update(&mut second, &mut b).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            h.uow.rollback(&mut second).await.unwrap();
            if !loser_waits_for_commit {
                h.uow.commit(&mut first).await.unwrap();
            }

            let row = h.db.get(Note::TABLE, &id).unwrap();
            assert_eq!(row.version, v + 1);
            assert_eq!(row.fields["text"], "first");
        });
    }
}
