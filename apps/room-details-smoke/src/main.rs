//! Opens the room details screen for one joined room, replays a scripted list
//! of view actions and prints the resulting view state as JSON.

mod config;
mod logging;

use std::{error::Error, process, sync::Arc, time::Duration};

use room_details_core::{AsciiFold, IndicatorQueue, RoomDetailsOutcome, RoomDetailsViewState};
use room_details_matrix::{
    BackgroundSync, MatrixLoginConfig, MatrixRoomProxy, login_client, lookup_room,
};
use room_details_screen::{RoomDetailsScreen, ScreenConfig};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::SmokeConfig;

type SmokeResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            eprintln!(
                "Required: PIKACHAT_HOMESERVER, PIKACHAT_USER, PIKACHAT_PASSWORD, PIKACHAT_ROOM_ID"
            );
            process::exit(1);
        }
    };

    match run(config).await {
        Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("Failed to encode view state: {err}");
                process::exit(1);
            }
        },
        Err(err) => {
            eprintln!("Room details smoke failed: {err}");
            process::exit(1);
        }
    }
}

async fn run(config: SmokeConfig) -> SmokeResult<RoomDetailsViewState> {
    let client = login_client(&MatrixLoginConfig {
        homeserver: config.homeserver.clone(),
        data_dir: config.data_dir(),
        user_id_or_localpart: config.user_id.clone(),
        password: config.password.clone(),
        device_display_name: None,
    })
    .await?;
    let room = lookup_room(&client, &config.room_id)?;
    let proxy = Arc::new(MatrixRoomProxy::new(room).await?);
    let sync = BackgroundSync::start(client.clone());

    let indicators = Arc::new(IndicatorQueue::new());
    let (screen, mut outcomes) = RoomDetailsScreen::spawn(
        proxy,
        indicators.clone(),
        ScreenConfig {
            loading_title: config.loading_title.clone(),
        },
    );

    let settle = Duration::from_millis(config.settle_ms);
    let mut state_rx = screen.state();
    if timeout(settle, state_rx.wait_for(|state| !state.members.is_empty()))
        .await
        .is_err()
    {
        warn!("members did not arrive before the settle timeout");
    }

    let outcome_log = tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            match outcome {
                RoomDetailsOutcome::RequestMemberDetailsPresentation { members } => {
                    info!(member_count = members.len(), "member list requested");
                }
                RoomDetailsOutcome::LeftRoom => info!("left room"),
            }
        }
    });

    for action in &config.actions {
        info!(?action, "sending view action");
        screen.send(*action)?;
    }
    tokio::time::sleep(settle).await;

    let snapshot = screen.snapshot();
    let active_indicators = indicators.active()?.len();
    let indicator_events = indicators.history()?.len();
    info!(
        title = %snapshot.title,
        title_ascii = %snapshot.title.asciified(),
        member_count = snapshot.members.len(),
        dm_recipient = ?snapshot.dm_recipient.as_ref().map(|member| member.id.as_str()),
        active_indicators,
        indicator_events,
        "smoke run settled"
    );

    screen.dismiss();
    drop(screen);
    if let Err(err) = outcome_log.await {
        warn!(error = %err, "outcome logger task failed");
    }
    sync.stop().await;
    Ok(snapshot)
}
