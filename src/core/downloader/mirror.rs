/// Rewrites well-known upstream hosts onto a mirror base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRewriter {
    rules: Vec<(String, String)>,
}

const LIBRARIES_HOST: &str = "https://libraries.minecraft.net";
const GENERIC_HOSTS: [&str; 4] = [
    "https://launcher.mojang.com",
    "https://launchermeta.mojang.com",
    "https://piston-meta.mojang.com",
    "https://piston-data.mojang.com",
];

impl MirrorRewriter {
    pub fn new(mirror_base: &str, resource_base: &str) -> Self {
        let base = mirror_base.trim_end_matches('/');
        let mut rules = vec![
            (LIBRARIES_HOST.to_string(), format!("{base}/maven")),
            (
                resource_base.trim_end_matches('/').to_string(),
                format!("{base}/assets"),
            ),
        ];
        rules.extend(
            GENERIC_HOSTS
                .iter()
                .map(|host| (host.to_string(), base.to_string())),
        );
        Self { rules }
    }

    /// First matching upstream prefix is replaced; other URLs pass through.
    pub fn rewrite(&self, url: &str) -> String {
        for (upstream, replacement) in &self.rules {
            if let Some(rest) = url.strip_prefix(upstream.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    return format!("{replacement}{rest}");
                }
            }
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror() -> MirrorRewriter {
        MirrorRewriter::new(
            "https://bmclapi2.bangbang93.com/",
            "https://resources.download.minecraft.net",
        )
    }

    #[test]
    fn rewrites_library_asset_and_generic_hosts() {
        let m = mirror();
        assert_eq!(
            m.rewrite("https://libraries.minecraft.net/org/lwjgl/lwjgl.jar"),
            "https://bmclapi2.bangbang93.com/maven/org/lwjgl/lwjgl.jar"
        );
        assert_eq!(
            m.rewrite("https://resources.download.minecraft.net/ab/abcd"),
            "https://bmclapi2.bangbang93.com/assets/ab/abcd"
        );
        assert_eq!(
            m.rewrite("https://piston-data.mojang.com/v1/objects/x/client.jar"),
            "https://bmclapi2.bangbang93.com/v1/objects/x/client.jar"
        );
    }

    #[test]
    fn leaves_unknown_hosts_alone() {
        let m = mirror();
        let url = "https://maven.fabricmc.net/net/fabricmc/loader.jar";
        assert_eq!(m.rewrite(url), url);
        // Prefix must end at a path boundary.
        let lookalike = "https://libraries.minecraft.net.evil.example/x.jar";
        assert_eq!(m.rewrite(lookalike), lookalike);
    }
}
