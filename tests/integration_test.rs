use std::io::Write;

use assert_cmd::Command;
use predicates as pred;
use tempfile::NamedTempFile;

#[test]
fn end_to_end_replay_outputs_final_accounts() {
    // alice: loses everything, is blocked by the free play cooldown, plays one
    // free game, then tops up past the reinstatement threshold.
    // bob: wins once, then tries to bet more than he holds.
    let mut file = NamedTempFile::new().expect("create temp file");
    writeln!(
        file,
        "type, account, at, game, result, amount, payout\n\
    open, alice, 0,,,,\n\
    open, bob, 0,,,,\n\
    play, alice, 10, dice, loss, 1000,\n\
    play, alice, 20, dice, loss, 10,\n\
    play, alice, 3610, coinflip, loss, 10,\n\
    topup, alice, 3700,,, 150,\n\
    play, bob, 3800, slots, win, 100, 50\n\
    play, bob, 3900, slots, loss, 2000,\n\
    bogus, bob, 4000,,,,\n\
    evict,, 60000,,,,"
    )
    .unwrap();

    let exe = env!("CARGO_BIN_EXE_casino_ledger");
    let mut cmd = Command::new(exe);
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(pred::str::contains(
            "account,balance,free_play,games_played,games_won,total_won,total_lost",
        ))
        .stdout(pred::str::contains("alice,150.0000,false,2,0,0.0000,1000.0000"))
        .stdout(pred::str::contains("bob,1050.0000,false,1,1,50.0000,0.0000"))
        .stderr(pred::str::contains("DLQ Report - line 5"))
        .stderr(pred::str::contains("DLQ Report - line 9"))
        .stderr(pred::str::contains("DLQ Report - line 10"));
}

#[test]
fn config_file_changes_starting_balance() {
    let mut config = NamedTempFile::new().expect("create temp file");
    writeln!(config, "starting_balance: 100\nreinstatement_threshold: 0").unwrap();

    let mut input = NamedTempFile::new().expect("create temp file");
    writeln!(
        input,
        "type, account, at, game, result, amount, payout\n\
    open, carol, 0,,,,\n\
    play, carol, 1, roulette, loss, 100,"
    )
    .unwrap();

    let exe = env!("CARGO_BIN_EXE_casino_ledger");
    let mut cmd = Command::new(exe);
    cmd.arg(input.path()).arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stdout(pred::str::contains("carol,0.0000,true,1,0,0.0000,100.0000"));
}

#[test]
fn invalid_config_fails_the_run() {
    let mut config = NamedTempFile::new().expect("create temp file");
    writeln!(config, "max_commit_attempts: 0").unwrap();
    let input = NamedTempFile::new().expect("create temp file");

    let exe = env!("CARGO_BIN_EXE_casino_ledger");
    let mut cmd = Command::new(exe);
    cmd.arg(input.path()).arg("--config").arg(config.path());

    cmd.assert()
        .failure()
        .stderr(pred::str::contains("max_commit_attempts must be non-zero"));
}
