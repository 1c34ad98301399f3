use futures_util::future::try_join_all;
use piper_wire::Param;
use serde_json::Value;

use crate::{errors::CallFailure, question_table::QuestionTable};

/// Resolves a call's parameters to concrete values, preserving positions.
///
/// Literals pass through untouched; each top-level reference awaits the
/// named question on `table`. All parameters resolve concurrently, so
/// independent references never serialize behind one another. The first
/// resolution failure aborts the whole call with a single `ParamResolution`
/// failure carrying the upstream message.
pub async fn resolve_params(
    table: &QuestionTable,
    calling_id: u64,
    params: Vec<Param>,
) -> Result<Vec<Value>, CallFailure> {
    let resolutions = params.into_iter().map(|param| {
        let table = table.clone();
        async move {
            match param {
                Param::Literal(value) => Ok(value),
                Param::Reference(reference) => table
                    .await_question(reference.result_of, Some(calling_id))
                    .await
                    .map_err(|failure| CallFailure::ParamResolution(failure.to_string())),
            }
        }
    });
    try_join_all(resolutions).await
}

#[cfg(test)]
mod tests {
    use piper_wire::Param;
    use serde_json::json;

    use super::resolve_params;
    use crate::{errors::CallFailure, question_table::QuestionTable};

    #[tokio::test]
    async fn literals_pass_through_in_position() {
        let table = QuestionTable::new();
        table.register(5);
        let args = resolve_params(
            &table,
            5,
            vec![Param::literal(json!("a")), Param::literal(json!([1, 2]))],
        )
        .await
        .expect("resolved");
        assert_eq!(args, vec![json!("a"), json!([1, 2])]);
    }

    #[tokio::test]
    async fn fulfilled_reference_resolves_without_suspending() {
        let table = QuestionTable::new();
        table.register(1);
        table.register(2);
        table.resolve(1, json!("Hello")).expect("resolve");
        let args = resolve_params(
            &table,
            2,
            vec![Param::reference(1), Param::literal(json!("!"))],
        )
        .await
        .expect("resolved");
        assert_eq!(args, vec![json!("Hello"), json!("!")]);
    }

    #[tokio::test]
    async fn pending_reference_suspends_until_the_question_completes() {
        let table = QuestionTable::new();
        table.register(1);
        table.register(2);
        let resolution = {
            let table = table.clone();
            tokio::spawn(async move { resolve_params(&table, 2, vec![Param::reference(1)]).await })
        };
        tokio::task::yield_now().await;
        table.resolve(1, json!("late")).expect("resolve");
        let args = resolution.await.expect("join").expect("resolved");
        assert_eq!(args, vec![json!("late")]);
    }

    #[tokio::test]
    async fn independent_references_resolve_concurrently() {
        let table = QuestionTable::new();
        for id in [1, 2, 3] {
            table.register(id);
        }
        let resolution = {
            let table = table.clone();
            tokio::spawn(async move {
                resolve_params(&table, 3, vec![Param::reference(1), Param::reference(2)]).await
            })
        };
        tokio::task::yield_now().await;
        // Completing in reverse order still resolves both positions.
        table.resolve(2, json!("second")).expect("resolve");
        table.resolve(1, json!("first")).expect("resolve");
        let args = resolution.await.expect("join").expect("resolved");
        assert_eq!(args, vec![json!("first"), json!("second")]);
    }

    #[tokio::test]
    async fn unknown_reference_aborts_only_this_call() {
        let table = QuestionTable::new();
        table.register(2);
        let failure = resolve_params(&table, 2, vec![Param::reference(7)])
            .await
            .expect_err("failure");
        assert_eq!(
            failure,
            CallFailure::ParamResolution("unknown question id 7".to_string())
        );
        // The calling question itself is untouched and still pending.
        table.resolve(2, json!("unaffected")).expect("still pending");
    }

    #[tokio::test]
    async fn rejected_dependency_fails_the_resolution_with_its_message() {
        let table = QuestionTable::new();
        table.register(1);
        table.register(2);
        table
            .reject(1, CallFailure::Handler("upstream failed".to_string()))
            .expect("reject");
        let failure = resolve_params(&table, 2, vec![Param::reference(1)])
            .await
            .expect_err("failure");
        assert_eq!(
            failure,
            CallFailure::ParamResolution("upstream failed".to_string())
        );
    }
}
