//! MarkdownV2 message bodies for votes, discussions and their sections.
//!
//! Every fragment ends with a blank line so sections concatenate directly.

use crate::{
    config::{LinkConfig, Thresholds},
    domain::Phase,
    formatting::{escape_markdown, plural, time_left_hm, verb_s, Icon},
    votes::{Discussion, ProposalSummary, Vote},
};

/// Longest proposal description shown by the lookup reply.
pub const DESCRIPTION_LIMIT: usize = 1024;

#[derive(Clone, Debug)]
pub struct Renderer {
    links: LinkConfig,
    thresholds: Thresholds,
}

/// Discussions partitioned by age and attestation.
#[derive(Clone, Debug, Default)]
pub struct DiscussionBuckets {
    pub dead: Vec<Discussion>,
    pub ending: Vec<Discussion>,
    /// Sorted by attestation rate, highest first. The flag marks discussions
    /// only a couple of attestations away from promotion.
    pub interesting: Vec<(Discussion, bool)>,
}

impl DiscussionBuckets {
    pub fn is_empty(&self) -> bool {
        self.dead.is_empty() && self.ending.is_empty() && self.interesting.is_empty()
    }
}

impl Renderer {
    pub fn new(links: LinkConfig, thresholds: Thresholds) -> Self {
        Self { links, thresholds }
    }

    fn vote_head(&self, vote: &Vote) -> String {
        format!(
            "[\\#{id}]({link}) _{kind}_: \"{title}\"\n",
            id = vote.proposal_id,
            link = self.links.proposal(vote.proposal_id),
            kind = escape_markdown(vote.content_type.as_str()),
            title = escape_markdown(&vote.title),
        )
    }

    fn vote_tally(vote: &Vote) -> String {
        let total = vote
            .displayed_total()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("{}/{total} voted", vote.result_count)
    }

    /// Link, type and title followed by the tally and time left.
    pub fn vote_line(&self, vote: &Vote) -> String {
        let left = vote
            .time_left
            .as_deref()
            .map(time_left_hm)
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "{}\\(_{}_\\. _Time left: {}_\\)\n\n",
            self.vote_head(vote),
            Self::vote_tally(vote),
            escape_markdown(&left),
        )
    }

    /// Completed vote: tally and final result instead of time left.
    pub fn completed_line(&self, vote: &Vote) -> String {
        let result = vote.result.as_ref().map(|r| r.as_str()).unwrap_or("n/a");
        format!(
            "{}\\(_{}_\\. _Result:_ *{}*\\)\n\n",
            self.vote_head(vote),
            Self::vote_tally(vote),
            escape_markdown(result),
        )
    }

    /// Link, type and title only.
    pub fn vote_brief(&self, vote: &Vote) -> String {
        format!("{}\n", self.vote_head(vote))
    }

    pub fn discussion_line(&self, discussion: &Discussion, emphasize: bool) -> String {
        let mut out = String::new();
        if emphasize {
            out.push_str(Icon::Attention.glyph());
            out.push(' ');
        }
        out.push_str(&format!(
            "[\\#{id}]({link})",
            id = discussion.id,
            link = self.links.proposal(discussion.id),
        ));
        if let Some(topic) = discussion.discourse_topic_id {
            out.push_str(&format!(" / [Topic {topic}]({})", self.links.topic(topic)));
        }
        let rate = (discussion.attestation_rate() * 100.0).round() / 100.0;
        out.push_str(&format!(
            " _{kind}_: \"{title}\"\n\\(_Attestation rate:_ *{rate}%* _Approved at:_ {date}\\)\n\n",
            kind = escape_markdown(&discussion.discussion_type),
            title = escape_markdown(&discussion.title),
            rate = escape_markdown(&rate.to_string()),
            date = escape_markdown(&discussion.approved_at.format("%Y-%m-%d").to_string()),
        ));
        out
    }

    fn lines<'a>(&self, votes: impl IntoIterator<Item = &'a Vote>, f: fn(&Self, &Vote) -> String) -> String {
        votes.into_iter().map(|v| f(self, v)).collect()
    }

    /// `🟦 __*2 new proposals* just entered _INFORMAL_:__`
    pub fn new_entries_section(&self, phase: Phase, votes: &[Vote]) -> String {
        if votes.is_empty() {
            return String::new();
        }
        let n = votes.len();
        format!(
            "{icon} __*{n} new proposal{s}* just entered _{phase}_:__\n\n{body}",
            icon = Icon::for_phase(phase).glyph(),
            s = plural(n),
            phase = phase.as_str().to_uppercase(),
            body = self.lines(votes, Self::vote_line),
        )
    }

    pub fn ending_section(&self, phase: Phase, votes: &[Vote]) -> String {
        if votes.is_empty() {
            return String::new();
        }
        let n = votes.len();
        format!(
            "{icon} __*{n} {phase} vote{s}* without a quorum end{v} within {h}h:__\n\n{body}",
            icon = Icon::Attention.glyph(),
            phase = phase.as_str(),
            s = plural(n),
            v = verb_s(n),
            h = self.thresholds.soon_hours(),
            body = self.lines(votes, Self::vote_line),
        )
    }

    pub fn expiring_section(&self, phase: Phase, votes: &[Vote]) -> String {
        if votes.is_empty() {
            return String::new();
        }
        let n = votes.len();
        format!(
            "{icon} __*{n} {phase} vote{s}* without a quorum expire{v} within {h}h:__\n\n{body}",
            icon = Icon::Expiring.glyph(),
            phase = phase.as_str(),
            s = plural(n),
            v = verb_s(n),
            h = self.thresholds.expiring_hours(),
            body = self.lines(votes, Self::vote_line),
        )
    }

    pub fn failed_section(&self, votes: &[Vote]) -> String {
        if votes.is_empty() {
            return String::new();
        }
        format!(
            "{icon} __*{n} failed without a quorum:*__\n\n{body}",
            icon = Icon::NoQuorum.glyph(),
            n = votes.len(),
            body = self.lines(votes, Self::vote_brief),
        )
    }

    pub fn completed_section(&self, votes: &[Vote]) -> String {
        if votes.is_empty() {
            return String::new();
        }
        let n = votes.len();
        format!(
            "{icon} __*{n} vote{s}* completed within 24h:__\n\n{body}",
            icon = Icon::Completed.glyph(),
            s = plural(n),
            body = self.lines(votes, Self::completed_line),
        )
    }

    /// Short-lived votes of one phase that are still open.
    pub fn simple_list_section(&self, phase: Phase, votes: &[Vote]) -> String {
        if votes.is_empty() {
            return String::new();
        }
        let n = votes.len();
        format!(
            "{icon} __*{n} {phase} SIMPLE vote{s}* require{v} attention:__\n\n{body}",
            icon = Icon::Simple.glyph(),
            phase = phase.as_str(),
            s = plural(n),
            v = verb_s(n),
            body = self.lines(votes, Self::vote_line),
        )
    }

    pub fn discussions_section(&self, buckets: &DiscussionBuckets) -> String {
        let mut text = String::new();

        let dead = buckets.dead.len();
        if dead > 0 {
            let (verb, s) = if dead == 1 { ("is", "") } else { ("are", "s") };
            text.push_str(&format!(
                "{} __There {verb} *{dead} discussion{s}* older than 90 days__\\.\n\n",
                Icon::Dead.glyph(),
            ));
        }

        let ending = buckets.ending.len();
        if ending > 0 {
            let (verb, s) = if ending == 1 { ("is", "") } else { ("are", "s") };
            text.push_str(&format!(
                "{} __*{ending} discussion{s}* {verb} ending within {} days:__\n\n",
                Icon::Ending.glyph(),
                self.thresholds.ending_days,
            ));
            for d in &buckets.ending {
                text.push_str(&self.discussion_line(d, false));
            }
        }

        let interesting = buckets.interesting.len();
        if interesting > 0 {
            text.push_str(&format!(
                "{} __*{interesting} discussion{}* require attention:__\n\n",
                Icon::Interest.glyph(),
                plural(interesting),
            ));
            for (d, emphasize) in &buckets.interesting {
                text.push_str(&self.discussion_line(d, *emphasize));
            }
        }

        text
    }

    /// Titled listing used by the on-demand menu queries.
    pub fn titled(title: &str, body: &str) -> String {
        format!("__{}__\n\n{body}", escape_markdown(title))
    }

    pub fn active_view(&self, phase: Phase, votes: &[Vote]) -> String {
        let title = match phase {
            Phase::Informal => "Active Informal",
            Phase::Formal => "Active Formal",
        };
        Self::titled(title, &self.lines(votes, Self::vote_line))
    }

    pub fn completed_view(&self, votes: &[Vote]) -> String {
        Self::titled("Recently Completed", &self.lines(votes, Self::completed_line))
    }

    pub fn proposal_view(&self, id: i64, proposal: &ProposalSummary) -> String {
        let mut description: String = proposal
            .short_description
            .chars()
            .take(DESCRIPTION_LIMIT)
            .collect();
        if description.len() < proposal.short_description.len() {
            description.push_str("...");
        }
        format!(
            "[\\#{id} __{title}__]({link})\n\n{desc}",
            title = escape_markdown(&proposal.title),
            link = self.links.proposal(id),
            desc = escape_markdown(&description),
        )
    }

    /// Comma-separated links to the watched proposals.
    pub fn watch_list(&self, ids: &[i64]) -> String {
        let links: Vec<String> = ids
            .iter()
            .map(|id| format!("[{id}]({})", self.links.proposal(*id)))
            .collect();
        format!(
            "{}{}",
            escape_markdown("Proposals you follow: "),
            links.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, links};

    fn renderer() -> Renderer {
        Renderer::new(links(), Thresholds::default())
    }

    #[test]
    fn vote_line_matches_upstream_layout() {
        let votes = fixtures::informal_votes();
        assert_eq!(
            renderer().vote_line(&votes[0]),
            "[\\#1000001](https://portal.devxdao.com/app/proposal/1000001) _simple_: \"Simple proposal 1\"\n\\(_0/40 voted_\\. _Time left: 23h 59m_\\)\n\n"
        );
    }

    #[test]
    fn new_entry_headers_pluralize() {
        let r = renderer();
        let informal = r.new_entries_section(Phase::Informal, &fixtures::informal_votes());
        assert!(informal.starts_with("🟦 __*2 new proposals* just entered _INFORMAL_:__\n\n"));
        let formal = r.new_entries_section(Phase::Formal, &fixtures::formal_votes());
        assert!(formal.starts_with("🟩 __*1 new proposal* just entered _FORMAL_:__\n\n"));
        assert!(formal.contains("\\(_1/33 voted_\\."));
    }

    #[test]
    fn failed_section_has_no_tally() {
        let failed: Vec<Vote> = fixtures::completed_votes()
            .into_iter()
            .filter(|v| v.is_no_quorum())
            .collect();
        assert_eq!(
            renderer().failed_section(&failed),
            "🔥 __*1 failed without a quorum:*__\n\n[\\#6000001](https://portal.devxdao.com/app/proposal/6000001) _simple_: \"Completed failed with no quorum\"\n\n"
        );
    }

    #[test]
    fn titles_are_escaped() {
        let mut vote = fixtures::informal_votes().remove(0);
        vote.title = "Fund v2.0 (phase-1)!".to_string();
        let line = renderer().vote_line(&vote);
        assert!(line.contains(r#""Fund v2\.0 \(phase\-1\)\!""#));
    }

    #[test]
    fn discussion_line_shows_rate_and_date() {
        let d = fixtures::discussions(chrono::Utc::now()).remove(0);
        let line = renderer().discussion_line(&d, true);
        assert!(line.starts_with("⚠ [\\#4000001]"));
        assert!(line.contains("/ [Topic 17](https://forum.devxdao.com/t/17)"));
        assert!(line.contains("*31\\.5%*"));
    }

    #[test]
    fn empty_sections_render_nothing() {
        let r = renderer();
        assert!(r.ending_section(Phase::Formal, &[]).is_empty());
        assert!(r.simple_list_section(Phase::Informal, &[]).is_empty());
        assert!(r.discussions_section(&DiscussionBuckets::default()).is_empty());
    }

    #[test]
    fn long_descriptions_are_clipped() {
        let p = ProposalSummary {
            title: "T".to_string(),
            short_description: "a".repeat(DESCRIPTION_LIMIT + 10),
        };
        let text = renderer().proposal_view(7, &p);
        assert!(text.ends_with(&format!("{}\\.\\.\\.", "a".repeat(10))));
        let short = ProposalSummary {
            title: "T".to_string(),
            short_description: "short".to_string(),
        };
        assert!(renderer().proposal_view(7, &short).ends_with("\n\nshort"));
    }
}
