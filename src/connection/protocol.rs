use super::pkt;
use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// One advertised reference. Only the first advertisement line carries
/// capabilities; they are recorded but never negotiated.
#[derive(Debug)]
pub struct RemoteRef {
    pub name: String,
    pub hash: String,
    pub capabilities: Vec<String>,
}

/// The digest to fetch plus the default branch (name and advertised digest)
/// when the remote has a `main` or `master` head.
#[derive(Debug)]
pub struct CloneTarget {
    pub head_hash: String,
    pub branch: Option<(String, String)>,
}

/// Parses the GET `/info/refs?service=git-upload-pack` body: pkt-lines
/// holding `<hex40> SP <ref>`, the first followed by `NUL <capabilities>`.
/// The `# service=` announcement and flush packets carry no refs.
pub fn parse_ref_advertisement(body: &[u8]) -> Result<Vec<RemoteRef>> {
    let mut refs = Vec::new();

    for payload in pkt::PktLines::trimmed(body) {
        if payload.is_empty() || payload.starts_with(b"# service=") {
            continue;
        }
        let line = std::str::from_utf8(payload).context("Ref advertisement is not UTF-8")?;

        let (line, caps) = match line.split_once('\0') {
            Some((line, caps)) => (line, caps),
            None => (line, ""),
        };
        let (hash, name) = line
            .split_once(' ')
            .with_context(|| format!("Malformed ref line: {:?}", line))?;
        if hash.len() != 40 {
            log::debug!("ignoring advertisement line {:?}", line);
            continue;
        }

        refs.push(RemoteRef {
            name: name.to_string(),
            hash: hash.to_string(),
            capabilities: caps.split_whitespace().map(str::to_string).collect(),
        });
    }

    Ok(refs)
}

/// Selects what to clone: the digest bound to HEAD (falling back to the
/// default branch when HEAD itself is not advertised) and the branch HEAD
/// should name afterwards.
pub fn select_clone_target(refs: &[RemoteRef]) -> Result<CloneTarget> {
    let mut head_hash = None;
    let mut branch = None;

    for r in refs {
        match r.name.as_str() {
            "HEAD" => {
                head_hash.get_or_insert_with(|| r.hash.clone());
            }
            "refs/heads/main" | "refs/heads/master" => {
                if branch.is_none() {
                    branch = Some((r.name.clone(), r.hash.clone()));
                }
            }
            _ => {}
        }
    }

    if head_hash.is_none() {
        head_hash = branch.as_ref().map(|(_, hash)| hash.clone());
    }

    Ok(CloneTarget {
        head_hash: head_hash.context("Remote advertised neither HEAD nor a default branch")?,
        branch,
    })
}

/// Body of the POST: `pkt("want <hex>\n") · flush · pkt("done\n")`, with no
/// capability strings.
pub fn build_fetch_request(want: &str) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    buf.put_slice(&pkt::encode(format!("want {}\n", want).as_bytes())?);
    buf.put_slice(b"0000");
    buf.put_slice(&pkt::encode(b"done\n")?);
    Ok(buf.freeze())
}

/// Byte offset of the `PACK` signature in an upload-pack response.
pub fn find_pack_start(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|window| window == b"PACK")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertisement() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&pkt::encode(b"# service=git-upload-pack\n").unwrap());
        body.extend_from_slice(b"0000");
        let head = format!("{} HEAD\0multi_ack side-band-64k\n", "a".repeat(40));
        body.extend_from_slice(&pkt::encode(head.as_bytes()).unwrap());
        let main = format!("{} refs/heads/main\n", "b".repeat(40));
        body.extend_from_slice(&pkt::encode(main.as_bytes()).unwrap());
        body.extend_from_slice(b"0000");
        body
    }

    #[test]
    fn parses_refs_and_capabilities() {
        let refs = parse_ref_advertisement(&advertisement()).unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "HEAD");
        assert_eq!(refs[0].hash, "a".repeat(40));
        assert_eq!(
            refs[0].capabilities,
            vec!["multi_ack".to_string(), "side-band-64k".to_string()]
        );
        assert_eq!(refs[1].name, "refs/heads/main");
        assert!(refs[1].capabilities.is_empty());
    }

    #[test]
    fn selects_head_and_default_branch() {
        let refs = parse_ref_advertisement(&advertisement()).unwrap();
        let target = select_clone_target(&refs).unwrap();

        assert_eq!(target.head_hash, "a".repeat(40));
        assert_eq!(
            target.branch,
            Some(("refs/heads/main".to_string(), "b".repeat(40)))
        );
    }

    #[test]
    fn falls_back_to_master_without_head() {
        let line = format!("{} refs/heads/master\n", "c".repeat(40));
        let body = pkt::encode(line.as_bytes()).unwrap();
        let refs = parse_ref_advertisement(&body).unwrap();
        let target = select_clone_target(&refs).unwrap();

        assert_eq!(target.head_hash, "c".repeat(40));
        assert_eq!(
            target.branch,
            Some(("refs/heads/master".to_string(), "c".repeat(40)))
        );
    }

    #[test]
    fn empty_advertisement_is_an_error() {
        let refs = parse_ref_advertisement(b"0000").unwrap();
        assert!(select_clone_target(&refs).is_err());
    }

    #[test]
    fn fetch_request_layout() {
        let want = "a".repeat(40);
        let body = build_fetch_request(&want).unwrap();
        let expected = format!("0032want {}\n00000009done\n", want);
        assert_eq!(&body[..], expected.as_bytes());
    }

    #[test]
    fn locates_pack_signature() {
        let mut resp = b"0008NAK\n".to_vec();
        let pack_at = resp.len();
        resp.extend_from_slice(b"PACK\x00\x00\x00\x02\x00\x00\x00\x00");
        assert_eq!(find_pack_start(&resp), Some(pack_at));
        assert_eq!(find_pack_start(b"no pack here"), None);
    }
}
