//! Ledger lifecycle integration tests
//!
//! Drive the ledger through submission, analysis requests and decryption
//! callbacks against the in-process crypto service. Callbacks are delivered by
//! hand unless a test exercises the relayer.

use std::sync::Arc;
use std::time::Duration;

use newsbias_common::events::{EventBus, LedgerEvent, TargetKind};
use newsbias_ledger::articles::{ArticleState, EncryptedFeatures, NO_ARTICLE};
use newsbias_ledger::authorization::Principal;
use newsbias_ledger::callback::CallbackOutcome;
use newsbias_ledger::codec;
use newsbias_ledger::crypto::{DecryptionRequest, LocalFheService};
use newsbias_ledger::tally::CategoryHash;
use newsbias_ledger::{relayer, Ledger, LedgerError};
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    ledger: Arc<Ledger>,
    service: Arc<LocalFheService>,
    requests: UnboundedReceiver<DecryptionRequest>,
    events: Arc<EventBus>,
}

fn deployer() -> Principal {
    Principal::new("deployer")
}

fn setup() -> Harness {
    let (service, requests) = LocalFheService::new();
    let service = Arc::new(service);
    let events = Arc::new(EventBus::new(100));
    let ledger = Arc::new(Ledger::new(deployer(), service.clone(), events.clone()));
    Harness {
        ledger,
        service,
        requests,
        events,
    }
}

fn encrypt_features(service: &LocalFheService, content: u32, sentiment: u32, keywords: u32) -> EncryptedFeatures {
    EncryptedFeatures {
        content: service.encrypt(content).unwrap(),
        sentiment: service.encrypt(sentiment).unwrap(),
        keywords: service.encrypt(keywords).unwrap(),
    }
}

impl Harness {
    async fn submit(&self, content: u32, sentiment: u32, keywords: u32) -> u64 {
        let features = encrypt_features(&self.service, content, sentiment, keywords);
        self.ledger.submit_article(&deployer(), features).await.unwrap()
    }

    /// Take the next queued decryption request and deliver its signed result
    async fn deliver_next(&mut self) -> Result<CallbackOutcome, LedgerError> {
        let request = self.requests.try_recv().expect("request should be queued");
        let response = self.service.fulfil(&request).unwrap();
        self.ledger
            .on_decrypted(response.request_id, &response.cleartexts, &response.proof)
            .await
    }
}

#[tokio::test]
async fn test_end_to_end_analysis() {
    let mut h = setup();
    let id = h.submit(90, 90, 7).await;
    assert_eq!(id, 1);

    let request_id = h.ledger.request_analysis(&deployer(), id).await.unwrap();
    let article = h.ledger.article(id).await.unwrap();
    assert_eq!(article.state, ArticleState::AnalysisRequested);
    assert_eq!(article.pending_request, Some(request_id));

    let outcome = h.deliver_next().await.unwrap();
    match outcome {
        CallbackOutcome::ArticleAnalyzed {
            article_id,
            analysis,
            category_created,
        } => {
            assert_eq!(article_id, id);
            assert_eq!(analysis.bias_score, "HighlyBiased");
            assert_eq!(analysis.comparison_result, "SignificantDeviation");
            assert_eq!(analysis.media_outlet, "OutletC");
            assert!(analysis.is_analyzed);
            assert!(category_created);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(h.ledger.article(id).await.unwrap().state, ArticleState::Analyzed);
    assert_eq!(h.ledger.categories().await, vec!["HighlyBiased".to_string()]);
    let handle = h.ledger.encrypted_count("HighlyBiased").await.unwrap();
    assert_eq!(h.service.decrypt(handle).unwrap(), 1);
    assert_eq!(
        h.ledger
            .category_for_hash(&CategoryHash::of("HighlyBiased"))
            .await
            .unwrap(),
        "HighlyBiased"
    );

    let stats = h.ledger.stats().await;
    assert_eq!(stats.analyzed, 1);
    assert_eq!(stats.outstanding_requests, 0);
}

#[tokio::test]
async fn test_unauthorized_submission_leaves_no_trace() {
    let h = setup();
    let features = encrypt_features(&h.service, 1, 2, 3);

    let err = h
        .ledger
        .submit_article(&Principal::new("mallory"), features)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert_eq!(h.ledger.stats().await.last_article_id, NO_ARTICLE);

    // Next authorized submission still gets id 1
    assert_eq!(h.submit(1, 2, 3).await, 1);
}

#[tokio::test]
async fn test_authorize_then_submit() {
    let h = setup();
    let alice = Principal::new("alice");

    assert!(h.ledger.authorize(&deployer(), alice.clone()).await.unwrap());
    assert!(!h.ledger.authorize(&deployer(), alice.clone()).await.unwrap());
    assert!(h.ledger.is_authorized(&alice).await);

    let err = h
        .ledger
        .authorize(&Principal::new("mallory"), Principal::new("mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));

    let features = encrypt_features(&h.service, 10, 10, 1);
    assert_eq!(h.ledger.submit_article(&alice, features).await.unwrap(), 1);
}

#[tokio::test]
async fn test_article_ids_strictly_increase() {
    let h = setup();
    let mut previous = NO_ARTICLE;
    for _ in 0..10 {
        let id = h.submit(50, 50, 0).await;
        assert!(id > previous);
        previous = id;
    }
    assert_eq!(h.ledger.stats().await.last_article_id, 10);
}

#[tokio::test]
async fn test_replayed_callback_is_rejected() {
    let mut h = setup();
    let id = h.submit(90, 90, 7).await;
    h.ledger.request_analysis(&deployer(), id).await.unwrap();

    let request = h.requests.try_recv().unwrap();
    let response = h.service.fulfil(&request).unwrap();
    let first = match h
        .ledger
        .on_decrypted(response.request_id, &response.cleartexts, &response.proof)
        .await
        .unwrap()
    {
        CallbackOutcome::ArticleAnalyzed { analysis, .. } => analysis,
        other => panic!("unexpected outcome: {:?}", other),
    };

    let err = h
        .ledger
        .on_decrypted(response.request_id, &response.cleartexts, &response.proof)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRequest(r) if r == request.request_id));

    // Article and counter unchanged by the second delivery
    assert_eq!(h.ledger.analysis(id).await.unwrap(), first);
    assert_eq!(h.ledger.article(id).await.unwrap().state, ArticleState::Analyzed);
    let handle = h.ledger.encrypted_count("HighlyBiased").await.unwrap();
    assert_eq!(h.service.decrypt(handle).unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_callbacks_commit_once() {
    let mut h = setup();
    let id = h.submit(90, 90, 7).await;
    h.ledger.request_analysis(&deployer(), id).await.unwrap();

    let request = h.requests.try_recv().unwrap();
    let response = Arc::new(h.service.fulfil(&request).unwrap());

    let deliveries: Vec<_> = (0..2)
        .map(|_| {
            let ledger = h.ledger.clone();
            let response = response.clone();
            tokio::spawn(async move {
                ledger
                    .on_decrypted(response.request_id, &response.cleartexts, &response.proof)
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for delivery in deliveries {
        match delivery.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert!(matches!(e, LedgerError::InvalidRequest(_))),
        }
    }
    assert_eq!(accepted, 1);

    let handle = h.ledger.encrypted_count("HighlyBiased").await.unwrap();
    assert_eq!(h.service.decrypt(handle).unwrap(), 1);
    assert_eq!(h.ledger.stats().await.outstanding_requests, 0);
}

#[tokio::test]
async fn test_unknown_request_id_is_rejected() {
    let h = setup();
    let cleartexts = codec::encode_words(&[1, 2, 3]);
    let proof = h.service.sign(12345, &cleartexts);

    let err = h.ledger.on_decrypted(12345, &cleartexts, &proof).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRequest(12345)));
}

#[tokio::test]
async fn test_forged_proof_is_rejected() {
    let mut h = setup();
    let id = h.submit(90, 90, 7).await;
    let request_id = h.ledger.request_analysis(&deployer(), id).await.unwrap();
    let _ = h.requests.try_recv().unwrap();

    let forged = codec::encode_words(&[10, 10, 1]);
    let err = h
        .ledger
        .on_decrypted(request_id, &forged, &[0u8; 32])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidProof(_)));

    let article = h.ledger.article(id).await.unwrap();
    assert_eq!(article.state, ArticleState::AnalysisRequested);
    assert!(h.ledger.categories().await.is_empty());
}

#[tokio::test]
async fn test_malformed_payload_keeps_request_outstanding() {
    let mut h = setup();
    let id = h.submit(90, 90, 7).await;
    let request_id = h.ledger.request_analysis(&deployer(), id).await.unwrap();
    let request = h.requests.try_recv().unwrap();

    // Correctly signed, but two words instead of three
    let short = codec::encode_words(&[90, 90]);
    let proof = h.service.sign(request_id, &short);
    let err = h.ledger.on_decrypted(request_id, &short, &proof).await.unwrap_err();
    assert!(matches!(err, LedgerError::MalformedPayload(_)));
    assert_eq!(h.ledger.stats().await.outstanding_requests, 1);

    // The genuine result can still be delivered
    let response = h.service.fulfil(&request).unwrap();
    let outcome = h
        .ledger
        .on_decrypted(response.request_id, &response.cleartexts, &response.proof)
        .await
        .unwrap();
    assert!(matches!(outcome, CallbackOutcome::ArticleAnalyzed { article_id, .. } if article_id == id));
}

#[tokio::test]
async fn test_second_analysis_request_is_refused() {
    let mut h = setup();
    let id = h.submit(50, 50, 0).await;
    let first = h.ledger.request_analysis(&deployer(), id).await.unwrap();

    let err = h.ledger.request_analysis(&deployer(), id).await.unwrap_err();
    assert!(matches!(err, LedgerError::RequestOutstanding { request_id, .. } if request_id == first));

    h.deliver_next().await.unwrap();
    let err = h.ledger.request_analysis(&deployer(), id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyAnalyzed(i) if i == id));
}

#[tokio::test]
async fn test_analysis_request_requires_authorization_and_existence() {
    let h = setup();
    let id = h.submit(50, 50, 0).await;

    let err = h
        .ledger
        .request_analysis(&Principal::new("mallory"), id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));

    let err = h.ledger.request_analysis(&deployer(), 99).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(99)));
    assert_eq!(h.ledger.stats().await.outstanding_requests, 0);
}

#[tokio::test]
async fn test_refused_analysis_request_rolls_back() {
    let h = setup();
    let id = h.submit(50, 50, 0).await;
    let Harness {
        ledger, requests, ..
    } = h;
    drop(requests);

    let err = ledger.request_analysis(&deployer(), id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Crypto(_)));

    let article = ledger.article(id).await.unwrap();
    assert_eq!(article.state, ArticleState::Pending);
    assert_eq!(article.pending_request, None);
    assert_eq!(ledger.stats().await.outstanding_requests, 0);
}

#[tokio::test]
async fn test_refused_count_decryption_rolls_back() {
    let mut h = setup();
    let id = h.submit(10, 10, 1).await;
    h.ledger.request_analysis(&deployer(), id).await.unwrap();
    h.deliver_next().await.unwrap();

    let Harness {
        ledger, requests, ..
    } = h;
    drop(requests);

    let err = ledger
        .request_count_decryption(&deployer(), "Neutral")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Crypto(_)));

    let counter = ledger.category_counter("Neutral").await.unwrap();
    assert_eq!(counter.pending_request, None);
    assert_eq!(ledger.stats().await.outstanding_requests, 0);
    assert!(ledger.decrypted_counts("Neutral").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_category_count_decryption_round_trip() {
    let mut h = setup();
    for _ in 0..3 {
        let id = h.submit(10, 10, 1).await;
        h.ledger.request_analysis(&deployer(), id).await.unwrap();
        h.deliver_next().await.unwrap();
    }
    assert_eq!(h.ledger.categories().await, vec!["Neutral".to_string()]);

    let request_id = h
        .ledger
        .request_count_decryption(&deployer(), "Neutral")
        .await
        .unwrap();
    let err = h
        .ledger
        .request_count_decryption(&deployer(), "Neutral")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::RequestOutstanding { .. }));

    let outcome = h.deliver_next().await.unwrap();
    assert_eq!(
        outcome,
        CallbackOutcome::CountDecrypted {
            category: "Neutral".to_string(),
            count: 3,
        }
    );

    let audit = h.ledger.decrypted_counts("Neutral").await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].request_id, request_id);
    assert_eq!(audit[0].count, 3);
    assert!(h
        .ledger
        .category_counter("Neutral")
        .await
        .unwrap()
        .pending_request
        .is_none());
}

#[tokio::test]
async fn test_count_decryption_for_unknown_category() {
    let h = setup();
    let err = h
        .ledger
        .request_count_decryption(&deployer(), "HighlyBiased")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CategoryNotFound(_)));
}

#[tokio::test]
async fn test_categories_in_discovery_order() {
    let mut h = setup();
    for (content, sentiment) in [(10, 10), (90, 90), (10, 10), (70, 70)] {
        let id = h.submit(content, sentiment, 0).await;
        h.ledger.request_analysis(&deployer(), id).await.unwrap();
        h.deliver_next().await.unwrap();
    }
    assert_eq!(
        h.ledger.categories().await,
        vec![
            "Neutral".to_string(),
            "HighlyBiased".to_string(),
            "ModeratelyBiased".to_string(),
        ]
    );
    let handle = h.ledger.encrypted_count("Neutral").await.unwrap();
    assert_eq!(h.service.decrypt(handle).unwrap(), 2);
}

#[tokio::test]
async fn test_events_are_emitted() {
    let mut h = setup();
    let mut rx = h.events.subscribe();

    let id = h.submit(90, 90, 7).await;
    let request_id = h.ledger.request_analysis(&deployer(), id).await.unwrap();
    h.deliver_next().await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let LedgerEvent::AnalysisRequested { request_id: r, .. } = &event {
            assert_eq!(*r, request_id);
        }
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec![
            "ArticleSubmitted",
            "AnalysisRequested",
            "CategoryCreated",
            "AnalysisCompleted",
        ]
    );
}

#[tokio::test]
async fn test_rejected_callback_emits_event() {
    let mut h = setup();
    let id = h.submit(90, 90, 7).await;
    let request_id = h.ledger.request_analysis(&deployer(), id).await.unwrap();
    let _ = h.requests.try_recv().unwrap();
    let mut rx = h.events.subscribe();

    let _ = h.ledger.on_decrypted(request_id, &[], &[]).await;

    match rx.try_recv().unwrap() {
        LedgerEvent::CallbackRejected {
            request_id: r,
            target,
            ..
        } => {
            assert_eq!(r, request_id);
            assert_eq!(target, Some(TargetKind::Article));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_relayer_completes_analysis() {
    let (service, requests) = LocalFheService::new();
    let service = Arc::new(service);
    let events = Arc::new(EventBus::new(100));
    let ledger = Arc::new(Ledger::new(deployer(), service.clone(), events.clone()));
    let mut rx = events.subscribe();

    tokio::spawn(relayer::run(requests, service.clone(), ledger.clone()));

    let features = encrypt_features(&service, 30, 40, 4);
    let id = ledger.submit_article(&deployer(), features).await.unwrap();
    ledger.request_analysis(&deployer(), id).await.unwrap();

    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(LedgerEvent::AnalysisCompleted { article_id, .. }) = rx.recv().await {
                return article_id;
            }
        }
    })
    .await
    .expect("analysis should complete");
    assert_eq!(completed, id);

    let analysis = ledger.analysis(id).await.unwrap();
    assert_eq!(analysis.bias_score, "Neutral");
    assert_eq!(analysis.media_outlet, "OutletE");
}
