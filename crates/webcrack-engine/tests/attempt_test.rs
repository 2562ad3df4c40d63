//! Detection and attempt scenarios against an in-memory DOM fake.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use webcrack_common::error::{AttemptError, CaptchaError, DriverError};
use webcrack_common::protocol::Selector;
use webcrack_common::roles::Role;
use webcrack_engine::captcha::CaptchaSolver;
use webcrack_engine::driver::{Driver, ElementRef, Scope};
use webcrack_engine::{
    AttemptOptions, ElementResolver, FormLocator, LoginAttemptExecutor, ResolveOptions,
};

#[derive(Debug, Clone)]
struct MockNode {
    id: ElementRef,
    /// Containing form node, if any.
    container: Option<ElementRef>,
    /// Expressions that resolve to this node.
    exprs: Vec<&'static str>,
    /// CSS path the driver reports for it.
    locator: &'static str,
    visible: bool,
    text: &'static str,
}

#[derive(Debug, Clone, Default)]
struct MockPage {
    url: String,
    nodes: Vec<MockNode>,
}

/// DOM fake: a static node set per page, with an optional post-submit page
/// swapped in when the submit control is activated.
#[derive(Debug, Default)]
struct MockDriver {
    page: MockPage,
    after_submit: Option<MockPage>,
    submit_locator: &'static str,
    fills: Vec<(String, String)>,
    activations: Vec<String>,
}

impl MockDriver {
    fn node(&self, id: ElementRef) -> Result<&MockNode, DriverError> {
        self.page
            .nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or(DriverError::StaleElement(id))
    }

    fn matches(node: &MockNode, scope: Scope, expression: &str) -> bool {
        let in_scope = match scope {
            Scope::Page => true,
            Scope::Within(container) => node.container == Some(container),
        };
        in_scope && (node.exprs.contains(&expression) || node.locator == expression)
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn query(
        &mut self,
        scope: Scope,
        expression: &str,
    ) -> Result<Option<ElementRef>, DriverError> {
        Ok(self
            .page
            .nodes
            .iter()
            .find(|n| Self::matches(n, scope, expression))
            .map(|n| n.id))
    }

    async fn query_all(
        &mut self,
        scope: Scope,
        expression: &str,
    ) -> Result<Vec<ElementRef>, DriverError> {
        Ok(self
            .page
            .nodes
            .iter()
            .filter(|n| Self::matches(n, scope, expression))
            .map(|n| n.id)
            .collect())
    }

    async fn is_visible(&mut self, element: ElementRef) -> Result<bool, DriverError> {
        Ok(self.node(element)?.visible)
    }

    async fn fill(&mut self, element: ElementRef, text: &str) -> Result<(), DriverError> {
        let locator = self.node(element)?.locator.to_string();
        self.fills.push((locator, text.to_string()));
        Ok(())
    }

    async fn activate(&mut self, element: ElementRef) -> Result<(), DriverError> {
        let locator = self.node(element)?.locator.to_string();
        self.activations.push(locator.clone());
        if locator == self.submit_locator {
            if let Some(after) = self.after_submit.take() {
                self.page = after;
            }
        }
        Ok(())
    }

    async fn screenshot(&mut self, element: ElementRef) -> Result<Vec<u8>, DriverError> {
        self.node(element)?;
        Ok(vec![0u8; 256])
    }

    async fn element_text(&mut self, element: ElementRef) -> Result<String, DriverError> {
        Ok(self.node(element)?.text.to_string())
    }

    async fn locator_of(&mut self, element: ElementRef) -> Result<String, DriverError> {
        Ok(self.node(element)?.locator.to_string())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.page.url.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn fast_resolver() -> ElementResolver {
    ElementResolver::with_options(ResolveOptions {
        max_retries: 2,
        backoff_base: Duration::from_millis(5),
        query_timeout: Duration::from_secs(1),
    })
}

fn fast_attempt_options() -> AttemptOptions {
    AttemptOptions {
        login_timeout: Duration::from_millis(400),
        settle_delay: Duration::from_millis(1),
        poll_interval: Duration::from_millis(20),
        captcha_timeout: Duration::from_millis(100),
    }
}

/// A page with one standard login form.
fn login_page() -> MockPage {
    MockPage {
        url: "http://target/login".to_string(),
        nodes: vec![
            MockNode {
                id: 1,
                container: None,
                exprs: vec!["form"],
                locator: "form:nth-child(1)",
                visible: true,
                text: "",
            },
            MockNode {
                id: 2,
                container: Some(1),
                exprs: vec!["#username", "input[type='text']"],
                locator: "#username",
                visible: true,
                text: "",
            },
            MockNode {
                id: 3,
                container: Some(1),
                exprs: vec!["#password", "input[type='password']"],
                locator: "#password",
                visible: true,
                text: "",
            },
            MockNode {
                id: 4,
                container: Some(1),
                exprs: vec!["button[type='submit']"],
                locator: "form:nth-child(1) > button",
                visible: true,
                text: "Sign in",
            },
        ],
    }
}

fn login_selector() -> Selector {
    Selector {
        user_input: "#username".to_string(),
        password_input: "#password".to_string(),
        login_btn: "form:nth-child(1) > button".to_string(),
        ..Default::default()
    }
}

fn welcome_page() -> MockPage {
    MockPage {
        url: "http://target/home".to_string(),
        nodes: vec![MockNode {
            id: 50,
            container: None,
            exprs: vec![".welcome-message"],
            locator: ".welcome-message",
            visible: true,
            text: "Welcome back",
        }],
    }
}

fn rejection_page() -> MockPage {
    MockPage {
        url: "http://target/login".to_string(),
        nodes: vec![MockNode {
            id: 60,
            container: None,
            exprs: vec![".login-error"],
            locator: ".login-error",
            visible: true,
            text: "Invalid credentials",
        }],
    }
}

// Scenario: correct credentials, the post-submit page carries a logged-in
// marker, the attempt succeeds within the polling window.
#[tokio::test]
async fn successful_login_with_correct_credentials() {
    let mut driver = MockDriver {
        page: login_page(),
        after_submit: Some(welcome_page()),
        submit_locator: "form:nth-child(1) > button",
        ..Default::default()
    };

    let resolver = fast_resolver();
    let executor = LoginAttemptExecutor::new(&resolver, None, fast_attempt_options());
    let outcome = executor
        .execute(
            &mut driver,
            &login_selector(),
            "admin",
            "admin123",
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_ok(), "expected success, got {:?}", outcome.err());
    assert_eq!(
        driver.fills,
        vec![
            ("#username".to_string(), "admin".to_string()),
            ("#password".to_string(), "admin123".to_string()),
        ]
    );
    assert_eq!(driver.activations, vec!["form:nth-child(1) > button"]);
}

// Scenario: wrong credentials, a visible error element appears post-submit,
// the attempt is rejected with the page-reported reason.
#[tokio::test]
async fn rejected_login_carries_page_reason() {
    let mut driver = MockDriver {
        page: login_page(),
        after_submit: Some(rejection_page()),
        submit_locator: "form:nth-child(1) > button",
        ..Default::default()
    };

    let resolver = fast_resolver();
    let executor = LoginAttemptExecutor::new(&resolver, None, fast_attempt_options());
    let outcome = executor
        .execute(
            &mut driver,
            &login_selector(),
            "admin",
            "wrong",
            &CancellationToken::new(),
        )
        .await;

    match outcome {
        Err(AttemptError::LoginRejected(reason)) => assert_eq!(reason, "Invalid credentials"),
        other => panic!("expected rejection, got {:?}", other),
    }
}

// No indicator ever appears: the outcome is a timeout, never an implicit
// success.
#[tokio::test]
async fn indeterminate_verification_times_out() {
    let mut driver = MockDriver {
        page: login_page(),
        after_submit: Some(MockPage {
            url: "http://target/somewhere".to_string(),
            nodes: vec![],
        }),
        submit_locator: "form:nth-child(1) > button",
        ..Default::default()
    };

    let resolver = fast_resolver();
    let executor = LoginAttemptExecutor::new(&resolver, None, fast_attempt_options());
    let outcome = executor
        .execute(
            &mut driver,
            &login_selector(),
            "admin",
            "admin123",
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(outcome, Err(AttemptError::LoginTimeout)));
}

struct StalledSolver;

#[async_trait]
impl CaptchaSolver for StalledSolver {
    async fn recognize(&self, _image: &[u8]) -> Result<String, CaptchaError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("never".to_string())
    }
}

// Scenario: captcha present but recognition stalls past its deadline. The
// attempt fails as a captcha error and the form is never submitted.
#[tokio::test]
async fn captcha_timeout_aborts_before_submit() {
    let mut page = login_page();
    page.nodes.push(MockNode {
        id: 5,
        container: Some(1),
        exprs: vec!["img[src*='captcha']"],
        locator: "#captcha-img",
        visible: true,
        text: "",
    });
    page.nodes.push(MockNode {
        id: 6,
        container: Some(1),
        exprs: vec!["input[placeholder*='verification']"],
        locator: "#captcha-input",
        visible: true,
        text: "",
    });

    let mut driver = MockDriver {
        page,
        after_submit: Some(welcome_page()),
        submit_locator: "form:nth-child(1) > button",
        ..Default::default()
    };

    let mut selector = login_selector();
    selector.captcha_img = "#captcha-img".to_string();
    selector.captcha_input = "#captcha-input".to_string();

    let solver = StalledSolver;
    let resolver = fast_resolver();
    let executor = LoginAttemptExecutor::new(&resolver, Some(&solver), fast_attempt_options());
    let outcome = executor
        .execute(
            &mut driver,
            &selector,
            "admin",
            "admin123",
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        outcome,
        Err(AttemptError::Captcha(CaptchaError::Timeout))
    ));
    assert!(
        driver.activations.is_empty(),
        "login controls must not be activated after a captcha failure"
    );
}

struct FixedSolver(&'static str);

#[async_trait]
impl CaptchaSolver for FixedSolver {
    async fn recognize(&self, _image: &[u8]) -> Result<String, CaptchaError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn recognized_captcha_text_is_filled_before_submit() {
    let mut page = login_page();
    page.nodes.push(MockNode {
        id: 5,
        container: Some(1),
        exprs: vec!["img[src*='captcha']"],
        locator: "#captcha-img",
        visible: true,
        text: "",
    });
    page.nodes.push(MockNode {
        id: 6,
        container: Some(1),
        exprs: vec!["input[placeholder*='verification']"],
        locator: "#captcha-input",
        visible: true,
        text: "",
    });

    let mut driver = MockDriver {
        page,
        after_submit: Some(welcome_page()),
        submit_locator: "form:nth-child(1) > button",
        ..Default::default()
    };

    let mut selector = login_selector();
    selector.captcha_img = "#captcha-img".to_string();
    selector.captcha_input = "#captcha-input".to_string();

    let solver = FixedSolver(" x7k2 ");
    let resolver = fast_resolver();
    let executor = LoginAttemptExecutor::new(&resolver, Some(&solver), fast_attempt_options());
    let outcome = executor
        .execute(
            &mut driver,
            &selector,
            "admin",
            "admin123",
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_ok());
    // Recognition output is trimmed before it reaches the input.
    assert!(driver
        .fills
        .contains(&("#captcha-input".to_string(), "x7k2".to_string())));
}

// Scenario: a decorative newsletter form next to the real login form. The
// locator scores both and picks the login form.
#[tokio::test]
async fn locator_prefers_highest_scoring_form() {
    let page = MockPage {
        url: "http://target/login".to_string(),
        nodes: vec![
            // Newsletter signup: a lone text input, score 1.
            MockNode {
                id: 1,
                container: None,
                exprs: vec!["form"],
                locator: "form:nth-child(1)",
                visible: true,
                text: "",
            },
            MockNode {
                id: 2,
                container: Some(1),
                exprs: vec!["input[type='text']"],
                locator: "form:nth-child(1) > input",
                visible: true,
                text: "",
            },
            // Real login form: user + pass + submit, score 3.
            MockNode {
                id: 10,
                container: None,
                exprs: vec!["form"],
                locator: "form:nth-child(2)",
                visible: true,
                text: "",
            },
            MockNode {
                id: 11,
                container: Some(10),
                exprs: vec!["input[name='username']"],
                locator: "form:nth-child(2) > input:nth-child(1)",
                visible: true,
                text: "",
            },
            MockNode {
                id: 12,
                container: Some(10),
                exprs: vec!["input[type='password']"],
                locator: "form:nth-child(2) > input:nth-child(2)",
                visible: true,
                text: "",
            },
            MockNode {
                id: 13,
                container: Some(10),
                exprs: vec!["button[type='submit']"],
                locator: "form:nth-child(2) > button",
                visible: true,
                text: "Login",
            },
        ],
    };

    let mut driver = MockDriver {
        page,
        ..Default::default()
    };

    let locator = FormLocator::with_resolver(fast_resolver(), false);
    let selector = locator.detect(&mut driver).await.expect("detection failed");

    assert!(selector.is_usable());
    assert_eq!(selector.user_input, "form:nth-child(2) > input:nth-child(1)");
    assert_eq!(
        selector.password_input,
        "form:nth-child(2) > input:nth-child(2)"
    );
    assert_eq!(selector.login_btn, "form:nth-child(2) > button");
}

#[tokio::test]
async fn locator_fails_without_a_usable_form() {
    let page = MockPage {
        url: "http://target/".to_string(),
        nodes: vec![
            MockNode {
                id: 1,
                container: None,
                exprs: vec!["form"],
                locator: "form:nth-child(1)",
                visible: true,
                text: "",
            },
            MockNode {
                id: 2,
                container: Some(1),
                exprs: vec!["input[type='text']"],
                locator: "form:nth-child(1) > input",
                visible: true,
                text: "",
            },
        ],
    };
    let mut driver = MockDriver {
        page,
        ..Default::default()
    };

    let locator = FormLocator::with_resolver(fast_resolver(), false);
    let outcome = locator.detect(&mut driver).await;
    match outcome {
        Err(AttemptError::ElementNotFound(reason)) => {
            assert_eq!(reason, "no suitable login form")
        }
        other => panic!("expected detection failure, got {:?}", other),
    }
}

// Without <form> containers the page itself is the implicit container.
#[tokio::test]
async fn locator_falls_back_to_whole_page() {
    let page = MockPage {
        url: "http://target/login".to_string(),
        nodes: vec![
            MockNode {
                id: 1,
                container: None,
                exprs: vec!["input[name='username']"],
                locator: "#u",
                visible: true,
                text: "",
            },
            MockNode {
                id: 2,
                container: None,
                exprs: vec!["input[type='password']"],
                locator: "#p",
                visible: true,
                text: "",
            },
            MockNode {
                id: 3,
                container: None,
                exprs: vec!["button[type='submit']"],
                locator: "#b",
                visible: true,
                text: "",
            },
        ],
    };
    let mut driver = MockDriver {
        page,
        ..Default::default()
    };

    let locator = FormLocator::with_resolver(fast_resolver(), false);
    let selector = locator.detect(&mut driver).await.expect("detection failed");
    assert_eq!(selector.user_input, "#u");
    assert_eq!(selector.login_btn, "#b");
}

// Identical DOM, no hint: repeated resolution lands on the same element.
#[tokio::test]
async fn resolution_is_deterministic() {
    let mut driver = MockDriver {
        page: login_page(),
        ..Default::default()
    };
    let resolver = fast_resolver();

    let first = resolver
        .require(&mut driver, Scope::Page, Role::Username, None)
        .await
        .unwrap();
    let second = resolver
        .require(&mut driver, Scope::Page, Role::Username, None)
        .await
        .unwrap();
    assert_eq!(
        driver.locator_of(first).await.unwrap(),
        driver.locator_of(second).await.unwrap()
    );
}

// A broken hint falls back to the chain instead of failing.
#[tokio::test]
async fn hint_failure_falls_back_to_chain() {
    let mut driver = MockDriver {
        page: login_page(),
        ..Default::default()
    };
    let resolver = fast_resolver();

    let found = resolver
        .require(
            &mut driver,
            Scope::Page,
            Role::Password,
            Some("#no-longer-there"),
        )
        .await
        .unwrap();
    assert_eq!(driver.locator_of(found).await.unwrap(), "#password");
}

#[tokio::test]
async fn hidden_elements_are_skipped() {
    let mut page = login_page();
    // A hidden text input earlier in the chain than the visible one.
    page.nodes.insert(
        1,
        MockNode {
            id: 90,
            container: Some(1),
            exprs: vec!["input[name='username']"],
            locator: "#hidden-user",
            visible: false,
            text: "",
        },
    );
    let mut driver = MockDriver {
        page,
        ..Default::default()
    };
    let resolver = fast_resolver();

    let found = resolver
        .require(&mut driver, Scope::Page, Role::Username, None)
        .await
        .unwrap();
    assert_eq!(driver.locator_of(found).await.unwrap(), "#username");
}

// Only the remember-me role tolerates exhaustion.
#[tokio::test]
async fn optional_role_resolves_to_none() {
    let mut driver = MockDriver {
        page: login_page(),
        ..Default::default()
    };
    let resolver = fast_resolver();

    let remember = resolver
        .find(&mut driver, Scope::Page, Role::RememberMe, None)
        .await
        .unwrap();
    assert!(remember.is_none());

    let missing = resolver
        .find(&mut driver, Scope::Page, Role::CaptchaImage, None)
        .await;
    assert!(matches!(missing, Err(AttemptError::ElementNotFound(_))));
}

/// Counts queries to show that every retry pass re-probes the live DOM.
#[derive(Debug, Default)]
struct CountingDriver {
    queries: Arc<AtomicUsize>,
}

#[async_trait]
impl Driver for CountingDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }
    async fn query(
        &mut self,
        _scope: Scope,
        _expression: &str,
    ) -> Result<Option<ElementRef>, DriverError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
    async fn query_all(
        &mut self,
        _scope: Scope,
        _expression: &str,
    ) -> Result<Vec<ElementRef>, DriverError> {
        Ok(vec![])
    }
    async fn is_visible(&mut self, _element: ElementRef) -> Result<bool, DriverError> {
        Ok(false)
    }
    async fn fill(&mut self, _element: ElementRef, _text: &str) -> Result<(), DriverError> {
        Ok(())
    }
    async fn activate(&mut self, _element: ElementRef) -> Result<(), DriverError> {
        Ok(())
    }
    async fn screenshot(&mut self, _element: ElementRef) -> Result<Vec<u8>, DriverError> {
        Ok(vec![])
    }
    async fn element_text(&mut self, _element: ElementRef) -> Result<String, DriverError> {
        Ok(String::new())
    }
    async fn locator_of(&mut self, _element: ElementRef) -> Result<String, DriverError> {
        Ok(String::new())
    }
    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(String::new())
    }
    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[tokio::test]
async fn every_retry_pass_requeries_the_dom() {
    let queries = Arc::new(AtomicUsize::new(0));
    let mut driver = CountingDriver {
        queries: Arc::clone(&queries),
    };
    let resolver = ElementResolver::with_options(ResolveOptions {
        max_retries: 3,
        backoff_base: Duration::from_millis(1),
        query_timeout: Duration::from_secs(1),
    });

    let outcome = resolver
        .find(&mut driver, Scope::Page, Role::RememberMe, None)
        .await
        .unwrap();
    assert!(outcome.is_none());

    // One expression in the remember-me chain, three passes.
    assert_eq!(queries.load(Ordering::SeqCst), 3);
}
