use super::*;

#[test]
fn parses_score_with_texts() {
    let cli = Cli::try_parse_from(["finsent-cli", "score", "Profits soared", "Shares fell"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Score { ref texts, stdin: false } if texts.len() == 2 && texts[0] == "Profits soared"
    ));
}

#[test]
fn parses_score_from_stdin() {
    let cli =
        Cli::try_parse_from(["finsent-cli", "score", "--stdin"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Score { ref texts, stdin: true } if texts.is_empty()
    ));
}

#[test]
fn parses_classify_with_negative_score() {
    let cli = Cli::try_parse_from(["finsent-cli", "classify", "-0.25"])
        .expect("expected valid cli args");

    assert!(matches!(cli.command, Commands::Classify { score } if (score + 0.25).abs() < 1e-12));
}

#[test]
fn classify_rejects_non_numeric_score() {
    assert!(Cli::try_parse_from(["finsent-cli", "classify", "bullish"]).is_err());
}

#[test]
fn parses_health() {
    let cli = Cli::try_parse_from(["finsent-cli", "health"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Health));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["finsent-cli"]).is_err());
}

#[test]
fn health_reports_unavailable_provider_as_error() {
    let state = ProviderState::unavailable(finsent_core::ProviderKind::Local, "no weights");
    let err = run_health(&state).expect_err("unavailable provider should fail");
    assert!(err.to_string().contains("no weights"), "got: {err}");
}

#[tokio::test]
async fn score_with_unavailable_provider_succeeds() {
    let state = ProviderState::unavailable(finsent_core::ProviderKind::Remote, "bad url");
    run_score(&SentimentScorer::new(state), &["Dividend cut".to_string()])
        .await
        .expect("scoring never fails");
}
