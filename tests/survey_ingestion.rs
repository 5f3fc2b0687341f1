mod common;

use axum::http::StatusCode;
use common::{admin_token, build_test_context, request_json, submit, survey};
use serde_json::json;

#[tokio::test]
async fn invalid_ratings_are_rejected_without_persisting() {
    let ctx = build_test_context().await;

    let mut bad_bodies = Vec::new();
    for bad in [json!(0), json!(11), json!(7.5), json!("7"), json!(null)] {
        let mut body = survey("101", 5, None);
        body["atendimento"] = bad;
        bad_bodies.push(body);
    }
    let mut missing_line = survey("101", 5, None);
    missing_line.as_object_mut().unwrap().remove("linha_numero");
    bad_bodies.push(missing_line);

    for body in bad_bodies {
        let (status, resp) = submit(&ctx.app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {resp}");
        assert!(resp["erro"].is_string());
    }

    let (status, list) = request_json(&ctx.app, "GET", "/api/pesquisas", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let ctx = build_test_context().await;
    let resp = common::send(
        &ctx.app,
        "POST",
        "/api/pesquisas",
        &[("Content-Type", "application/json".to_string())],
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["erro"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn every_tenth_submission_generates_a_report() {
    let ctx = build_test_context().await;

    for i in 1..=9 {
        let (status, body) = submit(&ctx.app, survey("101", 1, None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["total_linha"], i);
        assert_eq!(body["proximo_relatorio"], 10 - i);
        assert_eq!(body["relatorio_gerado"], false);
    }

    let (_, tenth) = submit(&ctx.app, survey("101", 1, Some("slow"))).await;
    assert_eq!(tenth["total_linha"], 10);
    assert_eq!(tenth["proximo_relatorio"], 10);
    assert_eq!(tenth["relatorio_gerado"], true);
    assert_eq!(tenth["pesquisa"]["linha_numero"], "101");
    assert_eq!(tenth["pesquisa"]["observacoes"], "slow");

    // Another line does not disturb the count.
    let (_, other) = submit(&ctx.app, survey("202", 9, None)).await;
    assert_eq!(other["total_linha"], 1);

    for _ in 0..9 {
        submit(&ctx.app, survey("101", 10, None)).await;
    }
    let (_, twentieth) = submit(&ctx.app, survey("101", 10, None)).await;
    assert_eq!(twentieth["relatorio_gerado"], true);

    let token = admin_token(&ctx.app).await;
    let (status, list) =
        request_json(&ctx.app, "GET", "/api/relatorios?linha=101", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 2);

    // Newest report covers only the ten most recent responses.
    let newest = &list["relatorios"][0];
    assert_eq!(newest["total_pesquisas"], 10);
    assert_eq!(newest["media_pontualidade"], 10.0);
    let oldest = &list["relatorios"][1];
    assert_eq!(oldest["media_pontualidade"], 1.0);
    assert_eq!(oldest["observacoes_count"], 1);
}

#[tokio::test]
async fn line_101_example_report() {
    let ctx = build_test_context().await;
    for _ in 0..10 {
        submit(&ctx.app, survey("101", 10, None)).await;
    }

    let token = admin_token(&ctx.app).await;
    let (_, list) = request_json(&ctx.app, "GET", "/api/relatorios", Some(&token), None).await;
    let id = list["relatorios"][0]["id"].as_i64().unwrap();

    let (status, report) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/relatorios/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["media_pontualidade"], 10.0);
    assert_eq!(report["media_frequencia"], 5.0);
    assert_eq!(report["media_geral"], 6.0);
    assert_eq!(report["classificacao_geral"], "Regular");
    assert_eq!(report["pesquisas"].as_array().unwrap().len(), 10);

    let recs: Vec<&str> = report["recomendacoes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r.as_str())
        .collect();
    assert_eq!(recs.len(), 4);
    assert!(!recs.iter().any(|r| r.contains("Congratulations")));
}

#[tokio::test]
async fn statistics_and_listing() {
    let ctx = build_test_context().await;
    submit(&ctx.app, survey("101", 10, None)).await;
    submit(&ctx.app, survey("101", 5, None)).await;
    submit(&ctx.app, survey("303", 1, None)).await;

    let (status, stats) = request_json(&ctx.app, "GET", "/api/estatisticas", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_pesquisas"], 3);
    assert_eq!(stats["total_linhas"], 2);
    let line_101 = &stats["linhas"][0];
    assert_eq!(line_101["linha"], "101");
    assert_eq!(line_101["total_pesquisas"], 2);
    // Per-response means 6.0 and 5.0.
    assert_eq!(line_101["media_geral"], 5.5);
    assert!(line_101["ultimo_envio"].is_null());

    let (_, list) = request_json(&ctx.app, "GET", "/api/pesquisas?linha=303", None, None).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["pesquisas"][0]["pontualidade"], 1);
}

#[tokio::test]
async fn forced_report_is_admin_only() {
    let ctx = build_test_context().await;
    submit(&ctx.app, survey("101", 8, None)).await;
    submit(&ctx.app, survey("101", 6, None)).await;

    let (status, _) =
        request_json(&ctx.app, "POST", "/api/forcar-relatorio/101", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = admin_token(&ctx.app).await;
    let (status, body) =
        request_json(&ctx.app, "POST", "/api/forcar-relatorio/101", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_pesquisas_usadas"], 2);
    assert_eq!(body["total_pesquisas_linha"], 2);
    assert_eq!(body["relatorio"]["media_pontualidade"], 7.0);

    let (status, _) =
        request_json(&ctx.app, "POST", "/api/forcar-relatorio/999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = request_json(&ctx.app, "GET", "/api/estatisticas", None, None).await;
    assert!(stats["linhas"][0]["ultimo_envio"].is_string());
}
