//! Selector profiles for the supported forums.

use std::time::Duration;

/// How long to wait for a page element before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything [`super::ForumScraper`] needs to know about one forum.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Module identity the profile is registered under.
    pub module: &'static str,
    pub home: &'static str,
    /// Present once the home page (with its login form) has loaded.
    pub home_ready: &'static str,
    pub login: LoginForm,
    pub search: SearchForm,
    pub results: ResultPages,
    pub attachments: AttachmentRule,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: &'static str,
    pub password: &'static str,
    /// Clicked after filling the fields, e.g. "stay logged in forever".
    pub pre_submit: Option<&'static str>,
    pub submit: &'static str,
    /// Present only when logged in.
    pub logged_in: &'static str,
    /// Error box shown after a rejected login.
    pub error: &'static str,
    /// Text in `error` that identifies bad credentials. `None` means any
    /// error shown there is a credential failure.
    pub bad_credentials_text: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct SearchForm {
    /// Clicked to reach the search form, e.g. an "advanced search" link.
    pub opener: Option<&'static str>,
    pub input: &'static str,
    /// Clicked after typing the term, e.g. a "show topics" radio button.
    pub pre_submit: Option<&'static str>,
    pub button: &'static str,
}

#[derive(Debug, Clone)]
pub struct ResultPages {
    /// Present once a results page has loaded.
    pub ready: &'static str,
    /// Present when a search found nothing.
    pub no_results: Option<&'static str>,
    /// Links to further result pages.
    pub pagination: &'static str,
    pub topics: &'static str,
    /// Links to further pages of a topic. Topics are archived per page
    /// when set.
    pub topic_pagination: Option<&'static str>,
}

/// Which anchors on a topic page are attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRule {
    pub href_contains: &'static str,
    pub reject_suffix: Option<&'static str>,
}

impl AttachmentRule {
    pub fn matches(&self, href: &str) -> bool {
        href.contains(self.href_contains)
            && !self
                .reject_suffix
                .is_some_and(|suffix| href.ends_with(suffix))
    }
}

pub fn digitalkaos() -> SiteProfile {
    const SUBMIT: &str = "#navbar_loginform > ul > li.submitButton > input[type=\"image\"]";
    SiteProfile {
        module: "digitalkaos",
        home: "http://digital-kaos.co.uk/forums/",
        home_ready: SUBMIT,
        login: LoginForm {
            username: "#navbar_username",
            password: "#navbar_password",
            pre_submit: None,
            submit: SUBMIT,
            logged_in: "#toplinks > ul > li:nth-child(1) > a",
            error: "div.body_wrapper > div.standard_error > form > div.blockbody.formcontrols > div.blockrow.restore",
            bad_credentials_text: Some("You have entered an invalid username or password."),
        },
        search: SearchForm {
            opener: None,
            input: "#header > div.searchBox > form > ul:nth-child(3) > li:nth-child(1) > div > input",
            pre_submit: None,
            button: "#header > div.searchBox > form > ul:nth-child(3) > li:nth-child(2) > input[type=\"image\"]",
        },
        results: ResultPages {
            ready: "#breadcrumb > div > div > div > ul > li.navbit.lastnavbit > span",
            no_results: Some("div.body_wrapper > div.standard_error > div > div"),
            pagination: "span.prev_next > a[rel=\"next\"]",
            topics: "div > div.threadinfo.thread > div > h3 > a.title",
            topic_pagination: None,
        },
        attachments: AttachmentRule {
            href_contains: "attachment.php?attachmentid",
            reject_suffix: None,
        },
        timeout: DEFAULT_TIMEOUT,
    }
}

pub fn ecuconnections() -> SiteProfile {
    const SUBMIT: &str = "#page-body > form > fieldset > input.button2";
    SiteProfile {
        module: "ecuconnections",
        home: "http://ecuconnections.com/forum/",
        home_ready: SUBMIT,
        login: LoginForm {
            username: "#username",
            password: "#password",
            pre_submit: None,
            submit: SUBMIT,
            logged_in: "#page-body > div:nth-child(4) > div > ul:nth-child(2) > li > dl > dt > a",
            error: "#login > div:nth-child(1) > div > div > fieldset > div",
            bad_credentials_text: None,
        },
        search: SearchForm {
            opener: Some("#search > fieldset > a"),
            input: "#keywords",
            pre_submit: Some(
                "#page-body > form > div.panel.bg2 > div > fieldset > dl:nth-child(5) > dd > label:nth-child(2)",
            ),
            button: "#page-body > form > div.panel.bg3 > div > fieldset > input.button1",
        },
        results: ResultPages {
            ready: "#page-body > p:nth-child(2) > a",
            no_results: None,
            pagination: "#page-body > form > div > div.rightside.pagination > span > a",
            topics: "#page-body > div > div > ul.topiclist.topics > li > dl > dt > a.topictitle",
            topic_pagination: Some("#page-body > div:nth-child(3) > div.pagination > span > a"),
        },
        attachments: AttachmentRule {
            href_contains: "download",
            reject_suffix: None,
        },
        timeout: DEFAULT_TIMEOUT,
    }
}

pub fn nefariousmotorsports() -> SiteProfile {
    const SUBMIT: &str = "body > div > div.menu > div > div:nth-child(2) > ul > li:nth-child(2) > table > tbody > tr > td > form > input.button";
    SiteProfile {
        module: "nefariousmotorsports",
        home: "http://nefariousmotorsports.com",
        home_ready: SUBMIT,
        login: LoginForm {
            username: "body > div > div.menu > div > div:nth-child(2) > ul > li:nth-child(2) > table > tbody > tr > td > form > input:nth-child(1)",
            password: "body > div > div.menu > div > div:nth-child(2) > ul > li:nth-child(2) > table > tbody > tr > td > form > input:nth-child(2)",
            pre_submit: Some(
                "body > div > div.menu > div > div:nth-child(2) > ul > li:nth-child(2) > table > tbody > tr > td > form > select > option:nth-child(5)",
            ),
            submit: SUBMIT,
            logged_in: "body > div > div.menu > div > div:nth-child(1) > ul > li:nth-child(8) > a",
            error: "#frmLogin > table > tbody > tr:nth-child(2) > td > b",
            bad_credentials_text: None,
        },
        search: SearchForm {
            opener: None,
            input: "body > div > div.menu > div > div:nth-child(3) > form > input.text",
            pre_submit: None,
            button: "body > div > div.menu > div > div:nth-child(3) > form > input.button",
        },
        results: ResultPages {
            ready: "#bodyarea > table.bordercolor > tbody",
            no_results: None,
            pagination: "#bodyarea > div:nth-child(2) > a",
            topics: "#bodyarea > table.bordercolor > tbody > tr > td:nth-child(3) > a",
            topic_pagination: Some(
                "#bodyarea > div:nth-child(3) > div:nth-child(3) > table > tbody > tr:nth-child(1) > td > a",
            ),
        },
        attachments: AttachmentRule {
            href_contains: "dlattach",
            reject_suffix: Some("image"),
        },
        timeout: DEFAULT_TIMEOUT,
    }
}

/// Every built-in profile.
pub fn all() -> Vec<SiteProfile> {
    vec![digitalkaos(), ecuconnections(), nefariousmotorsports()]
}
