use std::future::Future;

use uuid::Uuid;

use mingle_types::api::{DirectMessageView, MessageView};
use mingle_types::models::SessionStatus;

use crate::client::ApiClient;
use crate::config::PollConfig;
use crate::poller::{Feed, PollHandle, Snapshot, spawn_poller};

/// Messages of one chat session. Ends when the session does.
pub struct SessionFeed {
    client: ApiClient,
    session_id: Uuid,
}

impl Feed for SessionFeed {
    type Item = MessageView;

    fn fetch(&self) -> impl Future<Output = anyhow::Result<Snapshot<MessageView>>> + Send {
        let client = self.client.clone();
        let session_id = self.session_id;
        async move {
            let poll = client.messages(session_id).await?;
            Ok::<_, anyhow::Error>(Snapshot {
                items: poll.messages,
                ended: poll.status == SessionStatus::Ended,
            })
        }
    }
}

/// Direct messages with one friend. Fetching also marks the friend's
/// messages as read on the server.
pub struct DirectFeed {
    client: ApiClient,
    friend_id: Uuid,
}

impl Feed for DirectFeed {
    type Item = DirectMessageView;

    fn fetch(&self) -> impl Future<Output = anyhow::Result<Snapshot<DirectMessageView>>> + Send {
        let client = self.client.clone();
        let friend_id = self.friend_id;
        async move {
            let items = client.conversation(friend_id).await?;
            Ok::<_, anyhow::Error>(Snapshot { items, ended: false })
        }
    }
}

pub fn watch_session(client: &ApiClient, session_id: Uuid, poll: &PollConfig) -> PollHandle<MessageView> {
    let feed = SessionFeed {
        client: client.clone(),
        session_id,
    };
    spawn_poller(feed, poll.chat_interval)
}

pub fn watch_conversation(client: &ApiClient, friend_id: Uuid, poll: &PollConfig) -> PollHandle<DirectMessageView> {
    let feed = DirectFeed {
        client: client.clone(),
        friend_id,
    };
    spawn_poller(feed, poll.dm_interval)
}
