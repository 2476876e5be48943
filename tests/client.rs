//! Integration tests for the chat client against a scripted server.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{init_tracing, next_server, MockFactory, MockServer};
use tokio::sync::mpsc;
use tws::client::{
    Client, ClientError, ClientEvent, ClientEventKind, ClientOptions, ConnectionState, Credentials,
};
use tws::correlate::Subscription;
use tws::transport::{ReconnectOptions, TransportError};
use tws::{Message, ValidationError};

const NICK: &str = "tws_bot";
const PASS: &str = "oauth:0123456789abcdefghijklmnopqrst";

fn options() -> ClientOptions {
    ClientOptions::default()
        .with_auth(Credentials::new(NICK, PASS))
        .with_ping_interval(Duration::ZERO)
}

struct Harness {
    client: Client,
    server: MockServer,
    servers: mpsc::UnboundedReceiver<MockServer>,
    factory: Arc<MockFactory>,
}

async fn connect(options: ClientOptions) -> Harness {
    init_tracing();
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options, factory.clone());
    let login = async {
        let mut server = next_server(&mut servers).await;
        server.accept_login(NICK, PASS).await;
        server
    };
    let (connected, server) = tokio::join!(client.connect(), login);
    connected.unwrap();
    Harness {
        client,
        server,
        servers,
        factory,
    }
}

fn raw_sends(client: &Client) -> Arc<Mutex<Vec<String>>> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    client.on(ClientEventKind::RawSend, move |event| {
        if let ClientEvent::RawSend(raw) = event {
            sink.lock().unwrap().push(raw.message.clone());
        }
    });
    lines
}

#[tokio::test(start_paused = true)]
async fn test_handshake_sends_cap_pass_nick_in_order() {
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options(), factory);
    let sent = raw_sends(&client);
    let opened = Subscription::all(client.events(), ClientEventKind::Open);

    let login = async {
        let mut server = next_server(&mut servers).await;
        server.accept_login(NICK, PASS).await;
        server
    };
    let (connected, _server) = tokio::join!(client.connect(), login);
    connected.unwrap();

    assert!(client.connected());
    assert_eq!(client.state(), ConnectionState::Ready);
    opened.first(Duration::from_secs(1)).await.unwrap();
    assert_eq!(
        *sent.lock().unwrap(),
        vec![
            "CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands".to_string(),
            format!("PASS {}", PASS),
            format!("NICK {}", NICK),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_anonymous_login() {
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(
        ClientOptions::default().with_ping_interval(Duration::ZERO),
        factory,
    );
    let nick = client.username().to_string();
    assert!(nick.starts_with("justinfan"));

    let login = async {
        let mut server = next_server(&mut servers).await;
        server.accept_login(&nick, "blah").await;
        server
    };
    let (connected, _server) = tokio::join!(client.connect(), login);
    connected.unwrap();
    assert!(client.connected());
}

#[tokio::test(start_paused = true)]
async fn test_split_cap_acknowledgement() {
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options(), factory);

    let login = async {
        let mut server = next_server(&mut servers).await;
        server
            .expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
            .await;
        server.push(":tmi.twitch.tv CAP * ACK :twitch.tv/tags");
        server.push(":tmi.twitch.tv CAP * ACK :twitch.tv/membership twitch.tv/commands");
        server.expect(&format!("PASS {}", PASS)).await;
        server.expect(&format!("NICK {}", NICK)).await;
        server.push(&format!(":tmi.twitch.tv 001 {} :Welcome, GLHF!", NICK));
        server
    };
    let (connected, _server) = tokio::join!(client.connect(), login);
    connected.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refused_capability_fails_connect() {
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options(), factory);

    let login = async {
        let mut server = next_server(&mut servers).await;
        server
            .expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
            .await;
        server.push(":tmi.twitch.tv CAP * NAK :twitch.tv/commands");
        server
    };
    let (connected, mut server) = tokio::join!(client.connect(), login);
    assert_eq!(
        connected.unwrap_err(),
        ClientError::CapabilityDenied {
            refused: vec!["twitch.tv/commands".to_string()]
        }
    );
    assert!(!client.connected());
    assert_eq!(server.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_cap_request_times_out() {
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options(), factory);

    let login = async {
        let mut server = next_server(&mut servers).await;
        server
            .expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
            .await;
        server.push(":tmi.twitch.tv CAP * ACK :twitch.tv/tags");
        server
    };
    let (connected, _server) = tokio::join!(client.connect(), login);
    assert_eq!(
        connected.unwrap_err(),
        ClientError::HandshakeTimeout {
            missing: vec![
                "twitch.tv/commands".to_string(),
                "twitch.tv/membership".to_string()
            ]
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials() {
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options(), factory);

    let login = async {
        let mut server = next_server(&mut servers).await;
        server
            .expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
            .await;
        server.push(":tmi.twitch.tv CAP * ACK :twitch.tv/tags twitch.tv/membership twitch.tv/commands");
        server.expect(&format!("PASS {}", PASS)).await;
        server.expect(&format!("NICK {}", NICK)).await;
        server.push(":tmi.twitch.tv NOTICE * :Login authentication failed");
        server
    };
    let (connected, mut server) = tokio::join!(client.connect(), login);
    assert_eq!(
        connected.unwrap_err(),
        ClientError::Login("Login authentication failed".to_string())
    );
    assert!(!client.connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_is_rejected() {
    let harness = connect(options()).await;
    assert_eq!(
        harness.client.connect().await.unwrap_err(),
        ClientError::AlreadyConnected
    );
    assert_eq!(harness.factory.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_reports_transport_failure() {
    let (factory, _servers) = MockFactory::new();
    factory.fail_next(u32::MAX);
    let client = Client::with_factory(
        options().with_reconnect(ReconnectOptions {
            auto: true,
            retries: 2,
            delay_ms: 100,
        }),
        factory,
    );
    let errors = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&errors);
    client.on(ClientEventKind::Error, move |_| *counter.lock().unwrap() += 1);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::ConnectionTimeout { attempts: 2, .. })
    ));
    assert_eq!(*errors.lock().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_server_ping_is_answered() {
    let mut harness = connect(options()).await;

    harness.server.push("PING :tmi.twitch.tv");
    harness.server.expect("PONG tmi.twitch.tv").await;

    harness.server.push("PING 42");
    harness.server.expect("PONG 42").await;

    // A trailing parameter starting with ':' is echoed as a trailing.
    harness.server.push("PING ::x");
    harness.server.expect("PONG ::x").await;
}

#[tokio::test(start_paused = true)]
async fn test_received_messages_are_published() {
    let harness = connect(options()).await;
    let raw = Subscription::all(harness.client.events(), ClientEventKind::RawReceive);
    let parsed = Subscription::all(harness.client.events(), ClientEventKind::Receive);
    let privmsgs = Subscription::all(harness.client.commands(), "privmsg".to_string());

    let line = "@badge-info=;badges=;color=#0D4200;display-name=ronni :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Kappa Keepo Kappa";
    harness.server.push(line);

    match raw.first(Duration::from_secs(1)).await.unwrap() {
        ClientEvent::RawReceive(raw) => assert_eq!(raw.message, line),
        other => panic!("unexpected event {:?}", other),
    }
    match parsed.first(Duration::from_secs(1)).await.unwrap() {
        ClientEvent::Receive(msg) => assert_eq!(msg.raw, line),
        other => panic!("unexpected event {:?}", other),
    }
    let msg = privmsgs.first(Duration::from_secs(1)).await.unwrap();
    assert_eq!(msg.nick(), Some("ronni"));
    assert_eq!(msg.tag("display-name"), Some("ronni"));
    assert_eq!(msg.params, vec!["#dallas", "Kappa Keepo Kappa"]);
}

#[tokio::test(start_paused = true)]
async fn test_batched_frame_with_bad_line() {
    let harness = connect(options()).await;
    let received = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(Vec::new()));
    {
        let received = Arc::clone(&received);
        harness.client.on(ClientEventKind::Receive, move |event| {
            if let ClientEvent::Receive(msg) = event {
                received.lock().unwrap().push(msg.command.clone());
            }
        });
        let failures = Arc::clone(&failures);
        harness.client.on(ClientEventKind::ParsingError, move |event| {
            if let ClientEvent::ParsingError { input, .. } = event {
                failures.lock().unwrap().push(input.clone());
            }
        });
    }
    let last = Subscription::all(harness.client.commands(), "userstate".to_string());

    harness.server.push(
        ":tmi.twitch.tv ROOMSTATE #dallas\r\n@badges=\r\n:tmi.twitch.tv USERSTATE #dallas\r\n",
    );
    last.first(Duration::from_secs(1)).await.unwrap();

    assert_eq!(*received.lock().unwrap(), vec!["ROOMSTATE", "USERSTATE"]);
    assert_eq!(*failures.lock().unwrap(), vec!["@badges="]);
}

#[tokio::test(start_paused = true)]
async fn test_join_and_part() {
    let mut harness = connect(options()).await;
    let client = harness.client.clone();

    let server = async {
        harness.server.expect("JOIN #twitchdev").await;
        // Someone else joining does not confirm our join.
        harness
            .server
            .push(":viewer!viewer@viewer.tmi.twitch.tv JOIN #twitchdev");
        harness.server.push(&format!(
            ":{0}!{0}@{0}.tmi.twitch.tv JOIN #twitchdev",
            NICK
        ));
    };
    let (joined, ()) = tokio::join!(client.join("TwitchDev", None), server);
    joined.unwrap();

    let server = async {
        harness.server.expect("PART #twitchdev").await;
        harness.server.push(&format!(
            ":{0}!{0}@{0}.tmi.twitch.tv PART #twitchdev",
            NICK
        ));
    };
    let (parted, ()) = tokio::join!(client.part("#twitchdev", None), server);
    parted.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_join_room() {
    let mut harness = connect(options()).await;
    let client = harness.client.clone();
    let target = "#chatrooms:44322889:04e762ec-ce8f-4cbc-b6a3-ffc871ab53da";

    let server = async {
        harness.server.expect(&format!("JOIN {}", target)).await;
        harness
            .server
            .push(&format!(":{0}!{0}@{0}.tmi.twitch.tv JOIN {1}", NICK, target));
    };
    let (joined, ()) = tokio::join!(
        client.join("44322889", Some("04e762ec-ce8f-4cbc-b6a3-ffc871ab53da")),
        server
    );
    joined.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_join_and_part_time_out() {
    let mut harness = connect(options()).await;
    let client = harness.client.clone();

    let (joined, ()) = tokio::join!(client.join("dallas", None), async {
        harness.server.expect("JOIN #dallas").await;
    });
    assert_eq!(
        joined.unwrap_err(),
        ClientError::JoinTimeout {
            channel: "#dallas".to_string()
        }
    );

    let (parted, ()) = tokio::join!(client.part("dallas", None), async {
        harness.server.expect("PART #dallas").await;
    });
    assert_eq!(
        parted.unwrap_err(),
        ClientError::PartTimeout {
            channel: "#dallas".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_ping_measures_round_trip() {
    let mut harness = connect(options()).await;
    let client = harness.client.clone();
    let pongs = Subscription::all(client.events(), ClientEventKind::Pong);

    let server = async {
        let ping = harness.server.recv().await.unwrap();
        let id = ping.strip_prefix("PING ").unwrap().to_string();
        tokio::time::sleep(Duration::from_millis(120)).await;
        // An unrelated PONG does not resolve the probe.
        harness.server.push(":tmi.twitch.tv PONG tmi.twitch.tv :unrelated");
        harness
            .server
            .push(&format!(":tmi.twitch.tv PONG tmi.twitch.tv :{}", id));
    };
    let (delay, ()) = tokio::join!(client.ping(), server);
    let delay = delay.unwrap();
    assert!(delay >= Duration::from_millis(120), "{:?}", delay);
    assert!(delay < Duration::from_millis(200), "{:?}", delay);

    match pongs.first(Duration::from_secs(1)).await.unwrap() {
        ClientEvent::Pong { delay: published } => assert_eq!(published, delay),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_ping_times_out() {
    let mut harness = connect(options()).await;
    let client = harness.client.clone();

    let (delay, ping) = tokio::join!(client.ping(), harness.server.recv());
    let id = ping.unwrap().strip_prefix("PING ").unwrap().to_string();
    assert_eq!(delay.unwrap_err(), ClientError::PingTimeout { id });
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_pings_use_distinct_ids() {
    let mut harness = connect(options()).await;
    let client = harness.client.clone();

    let pings = async { tokio::join!(client.ping(), client.ping()) };
    let server = async {
        let first = harness.server.recv().await.unwrap();
        let second = harness.server.recv().await.unwrap();
        let first = first.strip_prefix("PING ").unwrap().to_string();
        let second = second.strip_prefix("PING ").unwrap().to_string();
        assert_ne!(first, second);
        harness
            .server
            .push(&format!(":tmi.twitch.tv PONG tmi.twitch.tv :{}", first));
        second
    };
    let ((answered, unanswered), second) = tokio::join!(pings, server);

    assert!(answered.is_ok());
    assert_eq!(
        unanswered.unwrap_err(),
        ClientError::PingTimeout { id: second }
    );
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_probes_on_interval() {
    let mut harness =
        connect(options().with_ping_interval(Duration::from_secs(15))).await;
    let started = tokio::time::Instant::now();

    let ping = harness.server.recv().await.unwrap();
    assert!(ping.starts_with("PING "), "{}", ping);
    assert!(started.elapsed() >= Duration::from_secs(15));

    harness.client.disconnect();
    assert_eq!(harness.server.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_server_reconnect_request() {
    let mut harness = connect(options()).await;
    let reconnecting = Subscription::all(harness.client.events(), ClientEventKind::Reconnect);
    let reopened = Subscription::all(harness.client.events(), ClientEventKind::Open);

    harness.server.push(":tmi.twitch.tv RECONNECT");
    reconnecting.first(Duration::from_secs(1)).await.unwrap();
    assert!(!harness.client.connected());

    let mut second = next_server(&mut harness.servers).await;
    second.accept_login(NICK, PASS).await;
    reopened.first(Duration::from_secs(5)).await.unwrap();

    assert!(harness.client.connected());
    assert_eq!(harness.client.state(), ConnectionState::Ready);
    assert_eq!(harness.server.recv().await, None);

    harness.client.privmsg("dallas", "back again").unwrap();
    second.expect("PRIVMSG #dallas :back again").await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connection_logs_in_again() {
    let mut harness = connect(options()).await;
    let reopened = Subscription::all(harness.client.events(), ClientEventKind::Open);

    harness.server.close();
    let mut second = next_server(&mut harness.servers).await;
    second.accept_login(NICK, PASS).await;
    reopened.first(Duration::from_secs(5)).await.unwrap();

    assert!(harness.client.connected());
    assert_eq!(harness.factory.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_relogin_closes() {
    let mut harness = connect(options()).await;
    let errors = Subscription::all(harness.client.events(), ClientEventKind::Error);

    harness.server.close();
    let mut second = next_server(&mut harness.servers).await;
    second
        .expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
        .await;
    second.push(":tmi.twitch.tv CAP * NAK :twitch.tv/tags");

    match errors.first(Duration::from_secs(5)).await.unwrap() {
        ClientEvent::Error(ClientError::CapabilityDenied { refused }) => {
            assert_eq!(refused, vec!["twitch.tv/tags"])
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!harness.client.connected());
    assert_eq!(second.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect() {
    let mut harness = connect(options()).await;
    let closed = Subscription::all(harness.client.events(), ClientEventKind::Close);

    harness.client.disconnect();
    closed.first(Duration::from_secs(1)).await.unwrap();

    assert!(!harness.client.connected());
    assert_eq!(harness.client.state(), ConnectionState::Disconnected);
    assert_eq!(harness.server.recv().await, None);
    assert_eq!(
        harness.client.privmsg("dallas", "anyone?").unwrap_err(),
        ClientError::Transport(TransportError::NotConnected)
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.factory.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_without_auto_reconnect() {
    let options = options().with_reconnect(ReconnectOptions {
        auto: false,
        ..ReconnectOptions::default()
    });
    let harness = connect(options).await;
    let closed = Subscription::all(harness.client.events(), ClientEventKind::Close);

    harness.server.close();
    closed.first(Duration::from_secs(1)).await.unwrap();

    assert!(!harness.client.connected());
    assert_eq!(harness.factory.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_validates_before_writing() {
    let mut harness = connect(options()).await;
    let sent = raw_sends(&harness.client);

    let err = harness
        .client
        .send(&Message::new("PRIVMSG", ["#dallas", ":)"]))
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Validation(ValidationError::LeadingColon { index: 1 })
    );
    assert!(harness.server.try_recv().is_none());
    assert!(sent.lock().unwrap().is_empty());

    harness.client.privmsg("Dallas", "hello there").unwrap();
    harness.server.expect("PRIVMSG #dallas :hello there").await;
    assert_eq!(*sent.lock().unwrap(), vec!["PRIVMSG #dallas :hello there"]);
}

#[tokio::test(start_paused = true)]
async fn test_socket_drop_during_negotiation_restarts_handshake() {
    init_tracing();
    let (factory, mut servers) = MockFactory::new();
    let client = Client::with_factory(options(), factory.clone());
    let opens = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&opens);
    client.on(ClientEventKind::Open, move |_| *counter.lock().unwrap() += 1);

    let server = async {
        let mut first = next_server(&mut servers).await;
        first
            .expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
            .await;
        first.close();
        let mut second = next_server(&mut servers).await;
        second.accept_login(NICK, PASS).await;
        second
    };
    let (connected, mut second) = tokio::join!(client.connect(), server);
    connected.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    // One login on the new socket, announced once.
    assert!(second.try_recv().is_none());
    assert_eq!(*opens.lock().unwrap(), 1);
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(factory.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let mut harness = connect(options()).await;

    harness.factory.fail_next(1);
    harness.server.close();
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.client.disconnect();
    let mut errors = Subscription::all(harness.client.events(), ClientEventKind::Error);

    let client = &harness.client;
    let servers = &mut harness.servers;
    let login = async {
        let mut server = next_server(servers).await;
        server.accept_login(NICK, PASS).await;
        server
    };
    let (connected, mut third) = tokio::join!(client.connect(), login);
    connected.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.factory.attempts(), 3);
    assert!(harness.servers.try_recv().is_err());
    assert!(harness.client.connected());
    assert!(errors
        .next_before(tokio::time::Instant::now())
        .await
        .is_err());

    harness.client.privmsg("dallas", "hi").unwrap();
    third.expect("PRIVMSG #dallas hi").await;
}
